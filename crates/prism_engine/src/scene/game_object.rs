//! Scene objects and their optional components

use ash::vk;

use super::transform::TransformComponent;
use crate::foundation::math::Vec3;
use crate::render::backends::vulkan::resources::{BufferHandle, GpuResources, MeshHandle};
use crate::render::backends::vulkan::VulkanResult;

/// Stable identifier of a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequential id source owned by one scene
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Start at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id; ids are never reused
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }
}

/// Uniform buffer and descriptor set for one frame-in-flight slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    /// Host-visible uniform buffer written each frame
    pub buffer: BufferHandle,
    /// Set bound at set index 1
    pub descriptor_set: vk::DescriptorSet,
}

/// Per-object GPU state for one render pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ObjectGpu {
    /// No buffers or descriptor sets yet
    #[default]
    Unprovisioned,
    /// One slot per frame in flight, indexed by frame index
    Provisioned(Vec<UniformSlot>),
}

impl ObjectGpu {
    /// Whether GPU resources exist
    pub fn is_provisioned(&self) -> bool {
        matches!(self, Self::Provisioned(_))
    }

    /// Slot for `frame`, if provisioned
    pub fn slot(&self, frame: usize) -> Option<&UniformSlot> {
        match self {
            Self::Unprovisioned => None,
            Self::Provisioned(slots) => slots.get(frame),
        }
    }

    /// Destroy every slot's buffer and go back to `Unprovisioned`
    ///
    /// Every buffer is attempted; the first failure is returned. Descriptor
    /// sets stay in their pool until the allocator is reset.
    pub fn release(&mut self, resources: &mut dyn GpuResources) -> VulkanResult<()> {
        let Self::Provisioned(slots) = std::mem::take(self) else {
            return Ok(());
        };
        slots
            .into_iter()
            .map(|slot| resources.destroy_buffer(slot.buffer))
            .fold(Ok(()), |first, result| first.and(result))
    }
}

/// Marks an object as a point light
#[derive(Debug, Clone, PartialEq)]
pub struct PointLightComponent {
    /// Brightness multiplier stored in the color's w
    pub intensity: f32,
    /// GPU state of the light billboard pass
    pub gpu: ObjectGpu,
}

/// Anything placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    id: ObjectId,
    /// Base color; for lights the emitted color
    pub color: Vec3,
    /// World placement; a light's billboard radius is `scale.x`
    pub transform: TransformComponent,
    /// Mesh drawn by the simple pass
    pub mesh: Option<MeshHandle>,
    /// GPU state of the simple pass
    pub gpu: ObjectGpu,
    /// Present on point lights
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            color: Vec3::zeros(),
            transform: TransformComponent::default(),
            mesh: None,
            gpu: ObjectGpu::Unprovisioned,
            point_light: None,
        }
    }

    /// Identifier assigned by the owning scene
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Whether the simple pass draws this object
    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Release the GPU state of both passes
    pub fn release_gpu(&mut self, resources: &mut dyn GpuResources) -> VulkanResult<()> {
        let mesh = self.gpu.release(resources);
        let light = match self.point_light.as_mut() {
            Some(light) => light.gpu.release(resources),
            None => Ok(()),
        };
        mesh.and(light)
    }

    /// Billboard radius of a point light
    pub fn light_radius(&self) -> f32 {
        self.transform.scale.x
    }
}
