//! Alpha-blended billboards for point lights

use std::path::Path;

use ash::vk;
use nalgebra::{Rotation3, Unit};

use super::per_frame::{provision_uniform_slots, PerFrameDescriptors, PER_FRAME_SET, PER_OBJECT_SET};
use super::SystemState;
use crate::foundation::math::{vec4_from, Vec3};
use crate::render::backends::vulkan::resources::GpuResources;
use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorLayoutCache, GraphicsPipeline, PipelineConfig, ShaderEffect,
    SharedDevice, VulkanError, VulkanResult,
};
use crate::render::frame_info::{
    FrameContext, GlobalUbo, LightUbo, PassKind, PointLightUniform, MAX_LIGHTS,
};
use crate::scene::{ObjectId, Scene};

/// Binding names the point light shaders must declare
pub const POINT_LIGHT_BINDINGS: [&str; 2] = ["globalUbo", "lightUbo"];

const LIGHT_UBO: &str = "lightUbo";

/// Two triangles generated in the vertex shader
const BILLBOARD_VERTICES: u32 = 6;

/// Orders lights farthest first by squared distance from the camera
///
/// Equal distances keep every light and fall back to ascending id.
pub fn sort_lights_back_to_front(
    camera_position: &Vec3,
    lights: impl IntoIterator<Item = (ObjectId, Vec3)>,
) -> Vec<ObjectId> {
    let mut keyed: Vec<(f32, ObjectId)> = lights
        .into_iter()
        .map(|(id, position)| ((position - camera_position).norm_squared(), id))
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, id)| id).collect()
}

/// Animates point lights and draws one billboard per light
pub struct PointLightSystem {
    pipeline: GraphicsPipeline,
    effect: ShaderEffect,
    per_frame: PerFrameDescriptors,
    frames_in_flight: usize,
    state: SystemState,
}

impl PointLightSystem {
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
            &POINT_LIGHT_BINDINGS,
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
            &POINT_LIGHT_BINDINGS,
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

        // No vertex input: billboard corners come from gl_VertexIndex
        let config = PipelineConfig::default().enable_alpha_blending();
        let pipeline = GraphicsPipeline::new(device, &config, &effect, render_pass)?;
        log::info!("Point light system pipeline created");

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
        self.state.require(SystemState::PipelineBuilt, "point light system")?;
        self.per_frame.bind_buffer(&self.effect, frame, name, info, stages)
    }

    /// Build the per-frame sets and start accepting render calls
    pub fn finish_descriptors(
        &mut self,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<()> {
        self.state.require(SystemState::PipelineBuilt, "point light system")?;
        self.per_frame.finish(&self.effect, cache, allocator)?;
        self.state = SystemState::Running;
        Ok(())
    }

    /// Give every unprovisioned light its per-slot uniforms
    pub fn provision(
        &self,
        scene: &mut Scene,
        resources: &mut dyn GpuResources,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<usize> {
        let size = std::mem::size_of::<LightUbo>() as vk::DeviceSize;
        let mut provisioned = 0;

        for object in scene.iter_mut() {
            let Some(light) = object.point_light.as_mut() else {
                continue;
            };
            if light.gpu.is_provisioned() {
                continue;
            }
            light.gpu = provision_uniform_slots(
                &self.effect,
                LIGHT_UBO,
                size,
                self.frames_in_flight,
                resources,
                cache,
                allocator,
            )?;
            provisioned += 1;
        }

        if provisioned > 0 {
            log::debug!("Provisioned {} point lights", provisioned);
        }
        Ok(provisioned)
    }

    /// Rotate lights about the vertical axis and publish them to `ubo`
    pub fn update(&self, frame: &mut FrameContext<'_>, ubo: &mut GlobalUbo) -> VulkanResult<()> {
        let count = frame
            .scene
            .iter()
            .filter(|object| object.point_light.is_some())
            .count();
        if count > MAX_LIGHTS {
            return Err(VulkanError::invalid(format!(
                "{} point lights exceed the limit of {}",
                count, MAX_LIGHTS
            )));
        }

        let axis = Unit::new_normalize(Vec3::new(0.0, -1.0, 0.0));
        let rotation = Rotation3::from_axis_angle(&axis, frame.frame_time);

        let mut index = 0;
        for object in frame.scene.iter_mut() {
            let Some(light) = object.point_light.as_ref() else {
                continue;
            };
            object.transform.translation = rotation * object.transform.translation;
            ubo.point_lights[index] = PointLightUniform {
                position: vec4_from(&object.transform.translation, 1.0),
                color: vec4_from(&object.color, light.intensity),
            };
            index += 1;
        }
        ubo.num_lights = index as i32;
        Ok(())
    }

    /// Record the light pass, farthest billboard first
    pub fn render(&self, frame: &mut FrameContext<'_>) -> VulkanResult<()> {
        self.state.require(SystemState::Running, "point light system")?;
        frame.enter_pass(PassKind::Lights)?;

        let layout = self.effect.pipeline_layout();
        let global_set = self.per_frame.set(frame.frame_index)?;

        let camera_position = frame.camera.position();
        let order = sort_lights_back_to_front(
            &camera_position,
            frame
                .scene
                .iter()
                .filter(|object| object.point_light.is_some())
                .map(|object| (object.id(), object.transform.translation)),
        );

        frame.commands.bind_pipeline(self.pipeline.handle());
        frame
            .commands
            .bind_descriptor_sets(layout, PER_FRAME_SET, &[global_set]);

        for id in order {
            let object = frame
                .scene
                .get(id)
                .ok_or(VulkanError::ResourceNotFound { id: u64::from(id.0) })?;
            let Some(light) = object.point_light.as_ref() else {
                continue;
            };
            let slot = light.gpu.slot(frame.frame_index).ok_or_else(|| {
                VulkanError::invalid(format!(
                    "light {} drawn before provisioning for frame {}",
                    id, frame.frame_index
                ))
            })?;

            let ubo = LightUbo::new(
                vec4_from(&object.transform.translation, 1.0),
                vec4_from(&object.color, light.intensity),
                object.light_radius(),
            );
            frame
                .resources
                .write_buffer(slot.buffer, 0, bytemuck::bytes_of(&ubo))?;
            frame
                .commands
                .bind_descriptor_sets(layout, PER_OBJECT_SET, &[slot.descriptor_set]);
            frame.commands.draw(BILLBOARD_VERTICES, 1, 0, 0);
        }

        log::trace!("Light pass recorded for frame {}", frame.frame_index);
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
