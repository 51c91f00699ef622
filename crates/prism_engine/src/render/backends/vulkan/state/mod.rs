//! Swapchain-dependent state: swapchain, render pass, framebuffers and sync

pub mod framebuffer;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use framebuffer::FramebufferSet;
pub use render_pass::{pick_depth_format, RenderPass, ScenePassFormats, DEPTH_FORMAT_CANDIDATES};
pub use swapchain::{SurfaceTarget, Swapchain};
pub use sync::{Fence, FrameSync, ImagesInFlight, Semaphore};
