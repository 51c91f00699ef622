//! Lit, textured mesh pass

use std::path::Path;

use ash::vk;

use super::per_frame::{provision_uniform_slots, PerFrameDescriptors, PER_FRAME_SET, PER_OBJECT_SET};
use super::SystemState;
use crate::foundation::math::mat4_to_cols;
use crate::render::backends::vulkan::resources::{GpuResources, Vertex};
use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorLayoutCache, GraphicsPipeline, PipelineConfig, ShaderEffect,
    SharedDevice, VulkanError, VulkanResult,
};
use crate::render::frame_info::{FrameContext, ObjectUbo, PassKind};
use crate::scene::Scene;

/// Binding names the simple shaders must declare
pub const SIMPLE_BINDINGS: [&str; 3] = ["globalUbo", "texSampler", "objectUbo"];

const OBJECT_UBO: &str = "objectUbo";

/// Draws every object that has a mesh with an indexed draw
pub struct SimpleRenderSystem {
    pipeline: GraphicsPipeline,
    effect: ShaderEffect,
    per_frame: PerFrameDescriptors,
    frames_in_flight: usize,
    state: SystemState,
}

impl SimpleRenderSystem {
    /// Build from SPIR-V files
    pub fn from_files(
        device: SharedDevice,
        cache: &mut DescriptorLayoutCache,
        render_pass: vk::RenderPass,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let effect = ShaderEffect::from_files(
            device.clone(),
            cache,
            vertex_path,
            fragment_path,
            &SIMPLE_BINDINGS,
        )?;
        Self::with_effect(device, effect, render_pass, frames_in_flight)
    }

    /// Build from in-memory SPIR-V
    pub fn from_bytecode(
        device: SharedDevice,
        cache: &mut DescriptorLayoutCache,
        render_pass: vk::RenderPass,
        vertex_code: &[u8],
        fragment_code: &[u8],
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let effect = ShaderEffect::from_bytecode(
            device.clone(),
            cache,
            vertex_code,
            fragment_code,
            &SIMPLE_BINDINGS,
        )?;
        Self::with_effect(device, effect, render_pass, frames_in_flight)
    }

    fn with_effect(
        device: SharedDevice,
        effect: ShaderEffect,
        render_pass: vk::RenderPass,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::invalid("render system needs at least one frame in flight"));
        }

        let config = PipelineConfig::default()
            .with_vertex_input(Vertex::binding_descriptions(), Vertex::attribute_descriptions());
        let pipeline = GraphicsPipeline::new(device, &config, &effect, render_pass)?;
        log::info!("Simple render system pipeline created");

        Ok(Self {
            pipeline,
            effect,
            per_frame: PerFrameDescriptors::new(frames_in_flight),
            frames_in_flight,
            state: SystemState::PipelineBuilt,
        })
    }

    /// Bind a buffer into set 0 for `frame`
    pub fn bind_per_frame_buffer(
        &mut self,
        frame: usize,
        name: &str,
        info: vk::DescriptorBufferInfo,
        stages: vk::ShaderStageFlags,
    ) -> VulkanResult<()> {
        self.state.require(SystemState::PipelineBuilt, "simple render system")?;
        self.per_frame.bind_buffer(&self.effect, frame, name, info, stages)
    }

    /// Bind an image into set 0 for `frame`
    pub fn bind_per_frame_image(
        &mut self,
        frame: usize,
        name: &str,
        info: vk::DescriptorImageInfo,
        stages: vk::ShaderStageFlags,
    ) -> VulkanResult<()> {
        self.state.require(SystemState::PipelineBuilt, "simple render system")?;
        self.per_frame.bind_image(&self.effect, frame, name, info, stages)
    }

    /// Build the per-frame sets and start accepting render calls
    pub fn finish_descriptors(
        &mut self,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<()> {
        self.state.require(SystemState::PipelineBuilt, "simple render system")?;
        self.per_frame.finish(&self.effect, cache, allocator)?;
        self.state = SystemState::Running;
        Ok(())
    }

    /// Give every unprovisioned mesh object its per-slot uniforms
    ///
    /// Returns how many objects were provisioned by this call.
    pub fn provision(
        &self,
        scene: &mut Scene,
        resources: &mut dyn GpuResources,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<usize> {
        let size = std::mem::size_of::<ObjectUbo>() as vk::DeviceSize;
        let mut provisioned = 0;

        for object in scene.iter_mut() {
            if !object.has_mesh() || object.gpu.is_provisioned() {
                continue;
            }
            object.gpu = provision_uniform_slots(
                &self.effect,
                OBJECT_UBO,
                size,
                self.frames_in_flight,
                resources,
                cache,
                allocator,
            )?;
            provisioned += 1;
        }

        if provisioned > 0 {
            log::debug!("Provisioned {} mesh objects", provisioned);
        }
        Ok(provisioned)
    }

    /// Record the opaque pass
    pub fn render(&self, frame: &mut FrameContext<'_>) -> VulkanResult<()> {
        self.state.require(SystemState::Running, "simple render system")?;
        frame.enter_pass(PassKind::Opaque)?;

        let layout = self.effect.pipeline_layout();
        let global_set = self.per_frame.set(frame.frame_index)?;

        frame.commands.bind_pipeline(self.pipeline.handle());
        frame
            .commands
            .bind_descriptor_sets(layout, PER_FRAME_SET, &[global_set]);

        for object in frame.scene.iter() {
            let Some(mesh) = object.mesh else {
                continue;
            };
            let slot = object.gpu.slot(frame.frame_index).ok_or_else(|| {
                VulkanError::invalid(format!(
                    "object {} drawn before provisioning for frame {}",
                    object.id(),
                    frame.frame_index
                ))
            })?;

            let ubo = ObjectUbo {
                model: mat4_to_cols(&object.transform.matrix()),
                normal: mat4_to_cols(&object.transform.normal_matrix4()),
            };
            frame
                .resources
                .write_buffer(slot.buffer, 0, bytemuck::bytes_of(&ubo))?;

            let draw = frame.resources.mesh_draw(mesh)?;
            frame
                .commands
                .bind_descriptor_sets(layout, PER_OBJECT_SET, &[slot.descriptor_set]);
            frame.commands.bind_vertex_buffers(&[draw.vertex_buffer], &[0]);
            frame.commands.bind_index_buffer(draw.index_buffer);
            frame.commands.draw_indexed(draw.index_count, 1, 0, 0, 0);
        }

        log::trace!("Opaque pass recorded for frame {}", frame.frame_index);
        Ok(())
    }

    /// Lifecycle state
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Shader effect backing the pipeline
    pub fn effect(&self) -> &ShaderEffect {
        &self.effect
    }
}
