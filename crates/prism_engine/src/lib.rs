//! # Prism Engine
//!
//! A Vulkan rendering core whose descriptor plumbing is driven by SPIR-V
//! reflection.
//!
//! ## Features
//!
//! - **Shader reflection**: set layouts and binding names recovered from SPIR-V
//! - **Descriptor management**: structural layout cache, growable pool allocator
//!   and a set builder
//! - **Render systems**: a lit mesh pass and alpha-blended point light billboards
//! - **Frame loop**: frames in flight with swapchain recreation on resize
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prism_engine::prelude::*;
//!
//! let mut scene = Scene::new();
//! let light = scene.create_default_point_light();
//! light.transform.translation = Vec3::new(1.0, -1.0, 0.0);
//!
//! let mut camera = Camera::new();
//! camera.set_perspective_projection(50f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
//! camera.set_view_target(Vec3::new(0.0, -1.0, -3.0), Vec3::zeros(), Vec3::new(0.0, -1.0, 0.0));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{RendererConfig, ShaderConfig},
        foundation::{
            math::{Mat3, Mat4, Vec3, Vec4},
            time::{FpsCounter, Timer},
        },
        render::{
            backends::vulkan::{
                DescriptorAllocator, DescriptorLayoutCache, ImageData, MeshData, MeshHandle, ResourceRegistry,
                TextureHandle, Vertex, VulkanContext, VulkanError, VulkanPresenter, VulkanResult, Window,
            },
            Camera, FrameContext, GlobalUbo, PointLightSystem, Renderer, ResizeSignal, SimpleRenderSystem,
        },
        scene::{GameObject, ObjectId, Scene, TransformComponent},
    };
}
