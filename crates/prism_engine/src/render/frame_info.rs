//! Per-frame uniform layouts and the context handed to render systems

use bytemuck::{Pod, Zeroable};

use super::camera::Camera;
use crate::foundation::math::{mat4_to_cols, Mat4};
use crate::render::backends::vulkan::commands::CommandSink;
use crate::render::backends::vulkan::resources::GpuResources;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::scene::Scene;

/// Capacity of the light array in [`GlobalUbo`]
pub const MAX_LIGHTS: usize = 10;

/// One entry of the global light array
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PointLightUniform {
    /// World position; w ignored
    pub position: [f32; 4],
    /// RGB color; w is intensity
    pub color: [f32; 4],
}

/// Set 0, binding 0 of both passes (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Projection matrix
    pub projection: [[f32; 4]; 4],
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to world
    pub inverse_view: [[f32; 4]; 4],
    /// RGB ambient color; w is intensity
    pub ambient_light_color: [f32; 4],
    /// Active lights occupy the first `num_lights` entries
    pub point_lights: [PointLightUniform; MAX_LIGHTS],
    /// Number of valid entries in `point_lights`
    pub num_lights: i32,
    _padding: [i32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        let identity = mat4_to_cols(&Mat4::identity());
        Self {
            projection: identity,
            view: identity,
            inverse_view: identity,
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            point_lights: [PointLightUniform::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Copy the camera matrices in
    pub fn set_camera(&mut self, camera: &Camera) {
        self.projection = mat4_to_cols(camera.projection());
        self.view = mat4_to_cols(camera.view());
        self.inverse_view = mat4_to_cols(camera.inverse_view());
    }

    /// Bytes as laid out in the uniform buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Set 1, binding 0 of the simple pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUbo {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// Normal matrix widened to 4x4
    pub normal: [[f32; 4]; 4],
}

/// Set 1, binding 0 of the point light pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUbo {
    /// World position; w is 1
    pub position: [f32; 4],
    /// RGB color; w is intensity
    pub color: [f32; 4],
    /// Billboard radius
    pub radius: f32,
    _padding: [f32; 3],
}

impl LightUbo {
    /// Light uniform for one billboard
    pub fn new(position: [f32; 4], color: [f32; 4], radius: f32) -> Self {
        Self {
            position,
            color,
            radius,
            _padding: [0.0; 3],
        }
    }
}

/// Passes in the order they must be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassKind {
    /// Opaque meshes
    Opaque,
    /// Alpha-blended light billboards
    Lights,
}

/// Everything a render system needs for one frame
pub struct FrameContext<'a> {
    /// Frame-in-flight slot being recorded
    pub frame_index: usize,
    /// Seconds since the previous frame
    pub frame_time: f32,
    /// Command recording target
    pub commands: &'a mut dyn CommandSink,
    /// Camera for this frame
    pub camera: &'a Camera,
    /// Objects to draw
    pub scene: &'a mut Scene,
    /// Uniform buffers and meshes
    pub resources: &'a mut dyn GpuResources,
    last_pass: Option<PassKind>,
}

impl<'a> FrameContext<'a> {
    /// Bundle the frame's inputs
    pub fn new(
        frame_index: usize,
        frame_time: f32,
        commands: &'a mut dyn CommandSink,
        camera: &'a Camera,
        scene: &'a mut Scene,
        resources: &'a mut dyn GpuResources,
    ) -> Self {
        Self {
            frame_index,
            frame_time,
            commands,
            camera,
            scene,
            resources,
            last_pass: None,
        }
    }

    /// Record that `pass` starts, rejecting passes out of order
    pub fn enter_pass(&mut self, pass: PassKind) -> VulkanResult<()> {
        match self.last_pass {
            Some(previous) if previous > pass => Err(VulkanError::invalid(format!(
                "{:?} pass recorded after {:?} pass",
                pass, previous
            ))),
            _ => {
                self.last_pass = Some(pass);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::testing::{MockResources, RecordingSink};
    use std::mem::{align_of, size_of};

    #[test]
    fn test_uniform_sizes_match_std140() {
        assert_eq!(size_of::<PointLightUniform>(), 32);
        assert_eq!(size_of::<GlobalUbo>(), 544);
        assert_eq!(size_of::<ObjectUbo>(), 128);
        assert_eq!(size_of::<LightUbo>(), 48);
        assert_eq!(align_of::<GlobalUbo>(), 4);
    }

    #[test]
    fn test_global_ubo_field_offsets() {
        let ubo = GlobalUbo::default();
        let base = &ubo as *const GlobalUbo as usize;
        assert_eq!(&ubo.ambient_light_color as *const _ as usize - base, 192);
        assert_eq!(&ubo.point_lights as *const _ as usize - base, 208);
        assert_eq!(&ubo.num_lights as *const _ as usize - base, 528);
    }

    #[test]
    fn test_global_ubo_defaults() {
        let ubo = GlobalUbo::default();
        assert_eq!(ubo.ambient_light_color, [1.0, 1.0, 1.0, 0.02]);
        assert_eq!(ubo.num_lights, 0);
        assert_eq!(ubo.projection[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(ubo.as_bytes().len(), 544);
    }

    #[test]
    fn test_lights_pass_cannot_precede_opaque_pass() {
        let mut sink = RecordingSink::new();
        let camera = Camera::new();
        let mut scene = Scene::new();
        let mut resources = MockResources::new();
        let mut frame = FrameContext::new(0, 0.016, &mut sink, &camera, &mut scene, &mut resources);

        frame.enter_pass(PassKind::Opaque).unwrap();
        frame.enter_pass(PassKind::Lights).unwrap();
        assert!(frame.enter_pass(PassKind::Opaque).is_err());
    }
}
