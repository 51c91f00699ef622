//! Scene graph: an ordered collection of game objects
//!
//! The scene owns its [`IdAllocator`], so ids are unique per scene and never
//! reused after removal.

pub mod game_object;
pub mod transform;

use std::collections::BTreeMap;

pub use game_object::{
    GameObject, IdAllocator, ObjectGpu, ObjectId, PointLightComponent, UniformSlot,
};
pub use transform::TransformComponent;

use crate::foundation::math::Vec3;
use crate::render::backends::vulkan::resources::GpuResources;
use crate::render::backends::vulkan::VulkanResult;

/// Default point light intensity
pub const DEFAULT_LIGHT_INTENSITY: f32 = 10.0;

/// Default point light billboard radius
pub const DEFAULT_LIGHT_RADIUS: f32 = 0.1;

/// Objects keyed by id, iterated in id order
#[derive(Debug, Default)]
pub struct Scene {
    ids: IdAllocator,
    objects: BTreeMap<ObjectId, GameObject>,
}

impl Scene {
    /// Empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an empty object and return it for configuration
    pub fn create_object(&mut self) -> &mut GameObject {
        let id = self.ids.allocate();
        self.objects.entry(id).or_insert_with(|| GameObject::new(id))
    }

    /// Insert a point light
    pub fn create_point_light(&mut self, intensity: f32, radius: f32, color: Vec3) -> &mut GameObject {
        let object = self.create_object();
        object.color = color;
        object.transform.scale.x = radius;
        object.point_light = Some(PointLightComponent {
            intensity,
            gpu: ObjectGpu::Unprovisioned,
        });
        object
    }

    /// Insert a white point light with default intensity and radius
    pub fn create_default_point_light(&mut self) -> &mut GameObject {
        self.create_point_light(
            DEFAULT_LIGHT_INTENSITY,
            DEFAULT_LIGHT_RADIUS,
            Vec3::new(1.0, 1.0, 1.0),
        )
    }

    /// Look up an object
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Remove an object; its id is not handed out again
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Remove an object and destroy its uniform buffers
    ///
    /// The buffers must no longer be read by a submitted frame.
    pub fn despawn(
        &mut self,
        id: ObjectId,
        resources: &mut dyn GpuResources,
    ) -> VulkanResult<Option<GameObject>> {
        let Some(mut object) = self.objects.remove(&id) else {
            return Ok(None);
        };
        object.release_gpu(resources)?;
        Ok(Some(object))
    }

    /// Destroy the uniform buffers of every object, leaving them unprovisioned
    pub fn release_gpu(&mut self, resources: &mut dyn GpuResources) -> VulkanResult<()> {
        self.objects
            .values_mut()
            .map(|object| object.release_gpu(resources))
            .fold(Ok(()), |first, result| first.and(result))
    }

    /// Objects in id order
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Objects in id order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.values_mut()
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::testing::MockResources;
    use crate::render::backends::vulkan::VulkanError;
    use ash::vk;
    use ash::vk::Handle;

    #[test]
    fn test_ids_are_sequential_and_never_reused() {
        let mut scene = Scene::new();
        let a = scene.create_object().id();
        let b = scene.create_object().id();
        assert_eq!((a, b), (ObjectId(0), ObjectId(1)));

        assert!(scene.remove(b).is_some());
        assert_eq!(scene.create_object().id(), ObjectId(2));
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_separate_scenes_have_independent_ids() {
        let mut first = Scene::new();
        let mut second = Scene::new();
        first.create_object();
        first.create_object();
        assert_eq!(second.create_object().id(), ObjectId(0));
    }

    #[test]
    fn test_point_light_defaults() {
        let mut scene = Scene::new();
        let light = scene.create_default_point_light();
        assert_eq!(light.color, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(light.light_radius(), DEFAULT_LIGHT_RADIUS);
        let component = light.point_light.as_ref().unwrap();
        assert_eq!(component.intensity, DEFAULT_LIGHT_INTENSITY);
        assert!(!component.gpu.is_provisioned());
        assert!(!light.has_mesh());
    }

    fn provisioned(resources: &mut MockResources, frames: usize) -> ObjectGpu {
        let slots = (0..frames)
            .map(|frame| UniformSlot {
                buffer: resources.create_uniform_buffer(128).unwrap(),
                descriptor_set: vk::DescriptorSet::from_raw(0x900 + frame as u64),
            })
            .collect();
        ObjectGpu::Provisioned(slots)
    }

    #[test]
    fn test_despawn_destroys_every_slot_buffer() {
        let mut resources = MockResources::new();
        let mut scene = Scene::new();
        let kept = scene.create_object().id();
        let object = scene.create_object();
        object.gpu = provisioned(&mut resources, 3);
        let object_id = object.id();
        let light = scene.create_default_point_light();
        light.point_light.as_mut().unwrap().gpu = provisioned(&mut resources, 3);
        let light_id = light.id();
        assert_eq!(resources.buffer_count(), 6);

        let removed = scene.despawn(object_id, &mut resources).unwrap().unwrap();
        assert!(!removed.gpu.is_provisioned());
        assert_eq!(resources.buffer_count(), 3);

        scene.despawn(light_id, &mut resources).unwrap();
        assert_eq!(resources.buffer_count(), 0);
        assert!(scene.despawn(object_id, &mut resources).unwrap().is_none());
        assert!(scene.get(kept).is_some());
    }

    #[test]
    fn test_release_reports_already_destroyed_buffer() {
        let mut resources = MockResources::new();
        let mut scene = Scene::new();
        let gpu = provisioned(&mut resources, 2);
        let ObjectGpu::Provisioned(slots) = &gpu else {
            unreachable!()
        };
        resources.destroy_buffer(slots[0].buffer).unwrap();
        scene.create_object().gpu = gpu;

        let err = scene.release_gpu(&mut resources).unwrap_err();
        assert!(matches!(err, VulkanError::ResourceNotFound { .. }));
        assert_eq!(resources.buffer_count(), 0);
        assert!(scene.iter().all(|object| !object.gpu.is_provisioned()));
    }

    #[test]
    fn test_iteration_is_in_id_order() {
        let mut scene = Scene::new();
        for _ in 0..5 {
            scene.create_object();
        }
        scene.remove(ObjectId(2));
        let ids: Vec<u32> = scene.iter().map(|o| o.id().0).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
    }
}
