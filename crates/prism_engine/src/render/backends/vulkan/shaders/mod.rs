//! Shader reflection and shader effects

pub mod effect;
pub mod reflection;

pub use effect::{BindingSignature, ShaderEffect, MAX_BINDING_NUMBER, MAX_SET_NUMBER};
pub use reflection::{ReflectedBinding, SetAndBinding, ShaderReflection};
