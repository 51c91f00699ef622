//! Structural cache of descriptor set layouts

use std::collections::HashMap;

use ash::vk;

use crate::render::backends::vulkan::{SharedDevice, VulkanResult};

/// One binding slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    /// Binding index within the set
    pub binding: u32,
    /// Resource type bound at this slot
    pub descriptor_type: vk::DescriptorType,
    /// Array element count
    pub count: u32,
    /// Stages that access the binding
    pub stage_flags: vk::ShaderStageFlags,
}

impl LayoutBinding {
    /// Single (non-array) binding
    pub fn new(binding: u32, descriptor_type: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            descriptor_type,
            count: 1,
            stage_flags,
        }
    }
}

/// Canonical, order-independent form of a set layout
///
/// Bindings are kept sorted by binding index so that permutations of the same
/// binding list compare and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorLayoutKey {
    bindings: Vec<LayoutBinding>,
}

impl DescriptorLayoutKey {
    /// Build the canonical key for a binding list
    pub fn new(bindings: &[LayoutBinding]) -> Self {
        let mut bindings = bindings.to_vec();
        bindings.sort_by_key(|binding| binding.binding);
        Self { bindings }
    }

    /// Sorted bindings
    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }
}

/// Owns every descriptor set layout created through it
///
/// No eviction: the cache grows with the number of distinct layouts declared
/// by loaded shaders and releases everything on drop.
pub struct DescriptorLayoutCache {
    device: SharedDevice,
    layouts: HashMap<DescriptorLayoutKey, vk::DescriptorSetLayout>,
}

impl DescriptorLayoutCache {
    /// Create an empty cache
    pub fn new(device: SharedDevice) -> Self {
        Self {
            device,
            layouts: HashMap::new(),
        }
    }

    /// Return the layout for `bindings`, creating it on first request
    pub fn get_or_create(&mut self, bindings: &[LayoutBinding]) -> VulkanResult<vk::DescriptorSetLayout> {
        let key = DescriptorLayoutKey::new(bindings);
        if let Some(&layout) = self.layouts.get(&key) {
            return Ok(layout);
        }

        let layout = self.device.create_descriptor_set_layout(key.bindings())?;
        log::debug!(
            "Created descriptor set layout {:?} with {} binding(s)",
            layout,
            key.bindings().len()
        );
        self.layouts.insert(key, layout);
        Ok(layout)
    }

    /// Number of distinct layouts held
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Whether no layout has been created yet
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Drop for DescriptorLayoutCache {
    fn drop(&mut self) {
        for (_, layout) in self.layouts.drain() {
            self.device.destroy_descriptor_set_layout(layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::testing::MockDevice;

    fn ubo(binding: u32, stages: vk::ShaderStageFlags) -> LayoutBinding {
        LayoutBinding::new(binding, vk::DescriptorType::UNIFORM_BUFFER, stages)
    }

    fn sampler(binding: u32) -> LayoutBinding {
        LayoutBinding::new(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )
    }

    #[test]
    fn test_permuted_bindings_share_layout() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device.clone());

        let forward = [ubo(0, vk::ShaderStageFlags::VERTEX), sampler(1), ubo(2, vk::ShaderStageFlags::FRAGMENT)];
        let shuffled = [sampler(1), ubo(2, vk::ShaderStageFlags::FRAGMENT), ubo(0, vk::ShaderStageFlags::VERTEX)];

        let first = cache.get_or_create(&forward).unwrap();
        let second = cache.get_or_create(&shuffled).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(device.stats().layouts_created, 1);
    }

    #[test]
    fn test_distinct_type_or_stage_yields_distinct_layouts() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device.clone());

        let base = cache.get_or_create(&[ubo(0, vk::ShaderStageFlags::VERTEX)]).unwrap();
        let other_stage = cache.get_or_create(&[ubo(0, vk::ShaderStageFlags::FRAGMENT)]).unwrap();
        let other_type = cache
            .get_or_create(&[LayoutBinding::new(
                0,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::ShaderStageFlags::VERTEX,
            )])
            .unwrap();

        assert_ne!(base, other_stage);
        assert_ne!(base, other_type);
        assert_ne!(other_stage, other_type);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_array_count_is_part_of_key() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device);

        let single = sampler(0);
        let array = LayoutBinding { count: 4, ..single };

        let a = cache.get_or_create(&[single]).unwrap();
        let b = cache.get_or_create(&[array]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_drop_destroys_every_layout() {
        let device = MockDevice::shared();
        {
            let mut cache = DescriptorLayoutCache::new(device.clone());
            cache.get_or_create(&[]).unwrap();
            cache.get_or_create(&[sampler(0)]).unwrap();
        }
        let stats = device.stats();
        assert_eq!(stats.layouts_created, 2);
        assert_eq!(stats.layouts_destroyed, 2);
    }
}
