//! Engine-wide settings shared by the renderer and applications

pub mod config;

pub use config::{DescriptorConfig, RendererConfig, ShaderConfig, WindowConfig};
pub use crate::config::{Config, ConfigError};
