//! Sampled 2D textures
//!
//! Pixels reach the image through a staging buffer. The image walks
//! `UNDEFINED -> TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL` and is read
//! through a linear, repeating sampler.

use ash::{vk, Device};

use super::buffer::Buffer;
use super::device_image::{DeviceImage, ImageSpec};
use super::image_data::ImageData;
use crate::render::backends::vulkan::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Access and stage masks for one image layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Layout before the barrier
    pub from: vk::ImageLayout,
    /// Layout after the barrier
    pub to: vk::ImageLayout,
    /// Writes made visible by the barrier
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the barrier
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits for
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked until the barrier completes
    pub dst_stage: vk::PipelineStageFlags,
}

impl Transition {
    /// Masks for the two transitions a texture upload performs
    pub fn between(from: vk::ImageLayout, to: vk::ImageLayout) -> VulkanResult<Self> {
        let (src_access, dst_access, src_stage, dst_stage) = match (from, to) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            _ => {
                return Err(VulkanError::invalid(format!(
                    "unsupported image layout transition {:?} -> {:?}",
                    from, to
                )))
            }
        };
        Ok(Self {
            from,
            to,
            src_access,
            dst_access,
            src_stage,
            dst_stage,
        })
    }

    fn record(&self, device: &Device, command_buffer: vk::CommandBuffer, image: vk::Image, spec: &ImageSpec) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(self.from)
            .new_layout(self.to)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(spec.subresource_range())
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .build();
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                self.src_stage,
                self.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}

fn sampler_info() -> vk::SamplerCreateInfo {
    vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .compare_op(vk::CompareOp::ALWAYS)
        .build()
}

/// Uploaded RGBA8 image with its sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image: DeviceImage,
}

impl Texture {
    /// Upload `image_data` into a new device-local texture
    pub fn upload(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        pool: &CommandPool,
        queue: vk::Queue,
        image_data: &ImageData,
    ) -> VulkanResult<Self> {
        if !image_data.is_consistent() {
            return Err(VulkanError::invalid(format!(
                "image data of {} bytes does not match {}x{} RGBA",
                image_data.size_bytes(),
                image_data.width,
                image_data.height
            )));
        }

        let spec = ImageSpec::sampled_rgba(vk::Extent2D {
            width: image_data.width,
            height: image_data.height,
        });
        let to_transfer = Transition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        let to_sampled = Transition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let image = DeviceImage::new(device, memory_properties, spec)?;
        let staging = Buffer::staging(device.clone(), memory_properties, &image_data.data)?;

        pool.submit_once(queue, |device, command_buffer| {
            to_transfer.record(device, command_buffer, image.handle(), &spec);
            copy_to_image(device, command_buffer, staging.handle(), image.handle(), &spec);
            to_sampled.record(device, command_buffer, image.handle(), &spec);
        })?;

        let sampler = unsafe {
            device
                .create_sampler(&sampler_info(), None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Uploaded {}x{} texture", spec.extent.width, spec.extent.height);
        Ok(Self {
            device: device.clone(),
            sampler,
            image,
        })
    }

    /// Image info for a combined image sampler write
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Texture dimensions
    pub fn extent(&self) -> vk::Extent2D {
        self.image.spec().extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

fn copy_to_image(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    image: vk::Image,
    spec: &ImageSpec,
) {
    let range = spec.subresource_range();
    let region = vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: range.aspect_mask,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D::default(),
        image_extent: vk::Extent3D {
            width: spec.extent.width,
            height: spec.extent.height,
            depth: 1,
        },
    };
    unsafe {
        device.cmd_copy_buffer_to_image(
            command_buffer,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
    }
}
