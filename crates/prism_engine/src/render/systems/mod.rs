//! Render systems recorded inside the swapchain render pass
//!
//! Each system owns a [`ShaderEffect`](crate::render::backends::vulkan::ShaderEffect)
//! and a pipeline. After construction it accepts per-frame descriptor writes,
//! then `finish_descriptors` moves it to [`SystemState::Running`]; only a
//! running system records commands. The simple pass records before the point
//! light pass.

pub mod per_frame;
pub mod point_light_system;
pub mod simple_render_system;

pub use per_frame::{PerFrameDescriptors, PER_FRAME_SET, PER_OBJECT_SET};
pub use point_light_system::{sort_lights_back_to_front, PointLightSystem};
pub use simple_render_system::SimpleRenderSystem;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Lifecycle of a render system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Shaders loaded and pipeline created; per-frame sets not built yet
    PipelineBuilt,
    /// Per-frame sets built; recording allowed
    Running,
}

impl SystemState {
    pub(crate) fn require(self, wanted: SystemState, system: &str) -> VulkanResult<()> {
        if self == wanted {
            Ok(())
        } else {
            Err(VulkanError::invalid(format!(
                "{} is {:?}, operation needs {:?}",
                system, self, wanted
            )))
        }
    }
}
