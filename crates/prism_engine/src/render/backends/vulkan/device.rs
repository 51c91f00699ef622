//! Device seam for object creation and descriptor operations
//!
//! Every layer above the raw device (layout cache, descriptor allocator,
//! descriptor builder, shader effects, render systems) talks to the GPU only
//! through [`GpuDevice`]. The trait is implemented for `ash::Device`; the test
//! suite provides a recording double so descriptor and reflection logic can be
//! exercised without a driver.

use std::sync::Arc;

use ash::vk;

use super::descriptors::{DescriptorResource, DescriptorWrite, LayoutBinding};
use super::pipeline::{self, PipelineConfig};
use super::{VulkanError, VulkanResult};

/// Shared, thread-safe handle to a device implementation
pub type SharedDevice = Arc<dyn GpuDevice>;

/// Object creation and descriptor operations used by the rendering core
pub trait GpuDevice: Send + Sync {
    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule>;

    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a descriptor set layout from plain binding descriptions
    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a pipeline layout over contiguous set layouts, no push constants
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Create a graphics pipeline for subpass 0 of `render_pass`
    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<vk::Pipeline>;

    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Create a descriptor pool
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool>;

    /// Reset a descriptor pool, invalidating every set allocated from it
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()>;

    /// Destroy a descriptor pool
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Allocate one set; the raw result is returned so callers can react to
    /// pool exhaustion codes
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result>;

    /// Write resource references into sets
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);
}

impl GpuDevice for ash::Device {
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe {
            self.create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe {
            self.destroy_shader_module(module, None);
        }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding.binding)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stage_flags)
                    .build()
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);
        unsafe {
            self.create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe {
            self.destroy_descriptor_set_layout(layout, None);
        }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        unsafe {
            self.create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe {
            self.destroy_pipeline_layout(layout, None);
        }
    }

    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(
            self,
            config,
            vertex_module,
            fragment_module,
            layout,
            render_pass,
        )
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.destroy_pipeline(pipeline, None);
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        unsafe {
            self.create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()> {
        unsafe {
            self.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe {
            self.destroy_descriptor_pool(pool, None);
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter()
            .next()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        // Info structs are borrowed from `writes`, which outlives the call
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(write.set)
                    .dst_binding(write.binding)
                    .descriptor_type(write.descriptor_type);
                match &write.resource {
                    DescriptorResource::Buffer(info) => {
                        builder.buffer_info(std::slice::from_ref(info)).build()
                    }
                    DescriptorResource::Image(info) => {
                        builder.image_info(std::slice::from_ref(info)).build()
                    }
                }
            })
            .collect();

        unsafe {
            self.update_descriptor_sets(&vk_writes, &[]);
        }
    }
}
