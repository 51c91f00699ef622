//! Vulkan backend implementation
//!
//! Organized into device seams, descriptors, shaders, pipelines, resources,
//! swapchain state and initialization.

/// Error type shared by the whole backend
pub mod error;

/// Object creation seam over `ash::Device`
pub mod device;

/// Descriptor set layouts, pools and builders
pub mod descriptors;

/// SPIR-V reflection and shader effects
pub mod shaders;

/// Graphics pipeline configuration and creation
pub mod pipeline;

/// Buffers, meshes, textures and their registry
pub mod resources;

/// Command pools and command recording
pub mod commands;

/// Swapchain, render pass, framebuffers and synchronization
pub mod state;

/// Instance, device and window bring-up
pub mod initialization;

/// Presentation backend over a window surface
pub mod presenter;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{CommandPool, CommandRecorder, CommandSink};
pub use descriptors::{DescriptorAllocator, DescriptorBuilder, DescriptorLayoutCache, LayoutBinding};
pub use device::{GpuDevice, SharedDevice};
pub use error::{VulkanError, VulkanResult};
pub use initialization::{VulkanContext, Window};
pub use pipeline::{BlendMode, GraphicsPipeline, PipelineConfig};
pub use presenter::VulkanPresenter;
pub use resources::{
    BufferHandle, GpuResources, ImageData, MeshData, MeshHandle, ResourceRegistry, TextureHandle, Vertex,
};
pub use shaders::{ShaderEffect, ShaderReflection};
