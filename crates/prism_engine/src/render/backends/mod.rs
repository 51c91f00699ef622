//! Backend implementations for the render module
//!
//! Vulkan is the only backend.

/// Vulkan rendering backend implementation
pub mod vulkan;
