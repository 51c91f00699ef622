//! The scene pass: one subpass shared by the opaque and point light systems
//!
//! Opaque meshes write depth; the blended light billboards that follow test
//! against it in the same subpass. Color is presented, depth is discarded.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose optimal tiling supports depth attachments
///
/// `properties` reports the device's support for one format.
pub fn pick_depth_format<F>(properties: F) -> VulkanResult<vk::Format>
where
    F: Fn(vk::Format) -> vk::FormatProperties,
{
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|&format| {
            properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| VulkanError::InitializationFailed("no supported depth format".to_string()))
}

/// Attachment formats of the scene pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenePassFormats {
    /// Swapchain image format
    pub color: vk::Format,
    /// Depth format chosen for the device
    pub depth: vk::Format,
}

impl ScenePassFormats {
    /// Color at index 0, depth at index 1
    pub fn attachments(&self) -> [vk::AttachmentDescription; 2] {
        let cleared = |format, store_op, final_layout| vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout,
            ..Default::default()
        };
        [
            cleared(
                self.color,
                vk::AttachmentStoreOp::STORE,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
            cleared(
                self.depth,
                vk::AttachmentStoreOp::DONT_CARE,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ),
        ]
    }

    /// Orders this frame's clears after the previous frame's color and depth writes
    pub fn external_dependency() -> vk::SubpassDependency {
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        }
    }
}

/// Owned scene render pass
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
    formats: ScenePassFormats,
}

impl RenderPass {
    /// Create the scene pass for `formats`
    pub fn scene(device: Device, formats: ScenePassFormats) -> VulkanResult<Self> {
        let attachments = formats.attachments();
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build()];
        let dependencies = [ScenePassFormats::external_dependency()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        log::debug!(
            "Scene pass created for {:?} color, {:?} depth",
            formats.color,
            formats.depth
        );

        Ok(Self {
            device,
            render_pass,
            formats,
        })
    }

    /// Raw render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Attachment formats the pass was built for
    pub fn formats(&self) -> ScenePassFormats {
        self.formats
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
