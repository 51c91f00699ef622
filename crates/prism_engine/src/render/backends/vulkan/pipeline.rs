//! Graphics pipeline configuration and creation
//!
//! [`PipelineConfig`] is plain data so render systems can describe their
//! fixed-function state without holding Vulkan create-info pointers. Viewport
//! and scissor are always dynamic, which keeps pipelines valid across
//! swapchain recreation.

use std::ffi::CStr;

use ash::vk;

use super::shaders::ShaderEffect;
use super::{SharedDevice, VulkanError, VulkanResult};

const ENTRY_POINT: &[u8] = b"main\0";

/// Colour blending mode of the single colour attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blending disabled
    Opaque,
    /// `src.a * src + (1 - src.a) * dst`
    Alpha,
}

/// Fixed-function state of a graphics pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Polygon fill mode
    pub polygon_mode: vk::PolygonMode,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Winding order of front faces
    pub front_face: vk::FrontFace,
    /// Depth testing enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare_op: vk::CompareOp,
    /// Colour blending
    pub blend: BlendMode,
    /// Vertex buffer bindings
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            blend: BlendMode::Opaque,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Use the given vertex input layout
    pub fn with_vertex_input(
        mut self,
        bindings: Vec<vk::VertexInputBindingDescription>,
        attributes: Vec<vk::VertexInputAttributeDescription>,
    ) -> Self {
        self.vertex_bindings = bindings;
        self.vertex_attributes = attributes;
        self
    }

    /// Standard alpha blending over the colour attachment
    pub fn enable_alpha_blending(mut self) -> Self {
        self.blend = BlendMode::Alpha;
        self
    }

    /// Whether the pipeline reads any vertex buffer
    pub fn has_vertex_input(&self) -> bool {
        !self.vertex_bindings.is_empty()
    }
}

/// Owned graphics pipeline
pub struct GraphicsPipeline {
    device: SharedDevice,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Create a pipeline for `effect` in subpass 0 of `render_pass`
    pub fn new(
        device: SharedDevice,
        config: &PipelineConfig,
        effect: &ShaderEffect,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<Self> {
        let pipeline = device.create_graphics_pipeline(
            config,
            effect.vertex_module(),
            effect.fragment_module(),
            effect.pipeline_layout(),
            render_pass,
        )?;
        Ok(Self { device, pipeline })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.device.destroy_pipeline(self.pipeline);
    }
}

/// Build a Vulkan graphics pipeline from plain configuration
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    config: &PipelineConfig,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> VulkanResult<vk::Pipeline> {
    let entry = CStr::from_bytes_with_nul(ENTRY_POINT)
        .map_err(|e| VulkanError::InitializationFailed(format!("Invalid entry point name: {}", e)))?;

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(entry)
            .build(),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&config.vertex_bindings)
        .vertex_attribute_descriptions(&config.vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(config.topology)
        .primitive_restart_enable(false);

    // Counts only; the rectangles are set per frame
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(config.polygon_mode)
        .line_width(1.0)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(config.depth_test)
        .depth_write_enable(config.depth_write)
        .depth_compare_op(config.depth_compare_op)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachment = match config.blend {
        BlendMode::Opaque => vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build(),
        BlendMode::Alpha => vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build(),
    };

    let color_blend_attachments = [color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
            .map_err(|(_, err)| VulkanError::Api(err))?
    };

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| VulkanError::InitializationFailed("No pipeline returned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_opaque_depth_tested() {
        let config = PipelineConfig::default();
        assert_eq!(config.blend, BlendMode::Opaque);
        assert!(config.depth_test && config.depth_write);
        assert!(!config.has_vertex_input());
    }

    #[test]
    fn test_alpha_blending_keeps_other_state() {
        let config = PipelineConfig::default().enable_alpha_blending();
        assert_eq!(config.blend, BlendMode::Alpha);
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
    }
}
