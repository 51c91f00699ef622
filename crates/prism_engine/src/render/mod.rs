//! Rendering: Vulkan backend, camera, frame data, render systems and the
//! frame loop

pub mod backends;
pub mod camera;
pub mod frame_info;
pub mod renderer;
pub mod systems;

pub use camera::Camera;
pub use frame_info::{FrameContext, GlobalUbo, LightUbo, ObjectUbo, PassKind, PointLightUniform, MAX_LIGHTS};
pub use renderer::{AcquireOutcome, FrameState, PresentOutcome, PresentationBackend, Renderer, ResizeSignal};
pub use systems::{PointLightSystem, SimpleRenderSystem, SystemState};
