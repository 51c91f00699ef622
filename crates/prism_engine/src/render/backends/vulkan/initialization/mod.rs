//! Instance, device and window bring-up

pub mod context;
pub mod window;

pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanInstance};
pub use window::{Window, WindowError, WindowResult};
