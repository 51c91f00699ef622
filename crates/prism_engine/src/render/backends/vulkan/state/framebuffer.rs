//! Per-swapchain-image render targets for the scene pass

use ash::{vk, Device};

use super::render_pass::RenderPass;
use crate::render::backends::vulkan::resources::{DeviceImage, ImageSpec};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

struct ImageTarget {
    framebuffer: vk::Framebuffer,
    // Referenced by the framebuffer, so destroyed after it
    _depth: DeviceImage,
}

/// One framebuffer and depth image for each swapchain image
pub struct FramebufferSet {
    device: Device,
    extent: vk::Extent2D,
    targets: Vec<ImageTarget>,
}

impl FramebufferSet {
    /// Build targets for every swapchain view at `extent`
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        render_pass: &RenderPass,
        swapchain_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let depth_spec = ImageSpec::depth_attachment(extent, render_pass.formats().depth);
        let mut set = Self {
            device: device.clone(),
            extent,
            targets: Vec::with_capacity(swapchain_views.len()),
        };

        for &color_view in swapchain_views {
            let depth = DeviceImage::new(device, memory_properties, depth_spec)?;
            let attachments = [color_view, depth.view()];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                device
                    .create_framebuffer(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            set.targets.push(ImageTarget {
                framebuffer,
                _depth: depth,
            });
        }

        log::debug!(
            "Created {} scene targets at {}x{}",
            set.targets.len(),
            extent.width,
            extent.height
        );
        Ok(set)
    }

    /// Framebuffer for a swapchain image
    pub fn get(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.targets
            .get(image_index as usize)
            .map(|target| target.framebuffer)
            .ok_or_else(|| VulkanError::invalid(format!("no framebuffer for image {}", image_index)))
    }

    /// Size every target was created at
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Drop for FramebufferSet {
    fn drop(&mut self) {
        for target in &self.targets {
            unsafe {
                self.device.destroy_framebuffer(target.framebuffer, None);
            }
        }
    }
}
