//! Device-local 2D images with a single view
//!
//! Depth attachments and sampled textures differ only in format, usage and
//! aspect, so both are described by an [`ImageSpec`] and owned by a
//! [`DeviceImage`].

use ash::{vk, Device};

use super::buffer::find_memory_type;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Format of every sampled texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Aspect flags a view of `format` must cover
pub fn aspect_for(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Plain description of a single-mip, single-layer 2D image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    /// Width and height in texels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags the image is created with
    pub usage: vk::ImageUsageFlags,
}

impl ImageSpec {
    /// RGBA texture filled by a transfer and read by shaders
    pub fn sampled_rgba(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            format: TEXTURE_FORMAT,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        }
    }

    /// Depth attachment of a swapchain-sized framebuffer
    pub fn depth_attachment(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    /// The whole image as a subresource range
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_for(self.format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    fn create_info(&self) -> vk::ImageCreateInfo {
        vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(self.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1)
            .build()
    }
}

/// Image, bound memory and view, destroyed together
pub struct DeviceImage {
    device: Device,
    spec: ImageSpec,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl DeviceImage {
    /// Create and bind a device-local image described by `spec`
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        spec: ImageSpec,
    ) -> VulkanResult<Self> {
        if spec.extent.width == 0 || spec.extent.height == 0 {
            return Err(VulkanError::invalid(format!(
                "cannot create a {}x{} image",
                spec.extent.width, spec.extent.height
            )));
        }

        // Handles start null; vkDestroy* ignores them if a later step fails
        let mut owned = Self {
            device: device.clone(),
            spec,
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
        };

        owned.image = unsafe {
            device
                .create_image(&spec.create_info(), None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(owned.image) };
        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(find_memory_type(
                memory_properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?);
        owned.memory = unsafe {
            device
                .allocate_memory(&allocate_info, None)
                .map_err(VulkanError::Api)?
        };
        unsafe {
            device
                .bind_image_memory(owned.image, owned.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(owned.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(spec.format)
            .subresource_range(spec.subresource_range());
        owned.view = unsafe {
            device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(owned)
    }

    /// Raw image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over the whole image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Description the image was created from
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }
}

impl Drop for DeviceImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_aspect_follows_format() {
        assert_eq!(aspect_for(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_for(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_for(TEXTURE_FORMAT), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_depth_spec_carries_chosen_format() {
        let spec = ImageSpec::depth_attachment(extent(), vk::Format::D32_SFLOAT_S8_UINT);
        let info = spec.create_info();

        assert_eq!(info.format, vk::Format::D32_SFLOAT_S8_UINT);
        assert_eq!(info.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!((info.extent.width, info.extent.height, info.extent.depth), (640, 480, 1));
        assert!(spec
            .subresource_range()
            .aspect_mask
            .contains(vk::ImageAspectFlags::STENCIL));
    }

    #[test]
    fn test_sampled_spec_is_transfer_target() {
        let spec = ImageSpec::sampled_rgba(extent());
        assert_eq!(spec.format, TEXTURE_FORMAT);
        assert!(spec.usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(spec.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert_eq!(spec.subresource_range().aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(spec.create_info().initial_layout, vk::ImageLayout::UNDEFINED);
    }
}
