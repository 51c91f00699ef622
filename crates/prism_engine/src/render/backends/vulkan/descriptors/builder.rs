//! Descriptor set builder
//!
//! Collects `bind_buffer` / `bind_image` requests, then resolves the layout
//! through the [`DescriptorLayoutCache`], allocates a set from the
//! [`DescriptorAllocator`] and writes every collected resource into it.

use ash::vk;

use super::{DescriptorAllocator, DescriptorLayoutCache, LayoutBinding};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Concrete resource written into a descriptor slot
#[derive(Debug, Clone, Copy)]
pub enum DescriptorResource {
    /// Uniform or storage buffer range
    Buffer(vk::DescriptorBufferInfo),
    /// Sampled image, sampler or combined image sampler
    Image(vk::DescriptorImageInfo),
}

/// One descriptor write in owned form
#[derive(Debug, Clone, Copy)]
pub struct DescriptorWrite {
    /// Destination set
    pub set: vk::DescriptorSet,
    /// Destination binding index
    pub binding: u32,
    /// Descriptor type of the slot
    pub descriptor_type: vk::DescriptorType,
    /// Resource reference to write
    pub resource: DescriptorResource,
}

/// A written descriptor set and the layout it was allocated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltDescriptorSet {
    /// Allocated and written set
    pub set: vk::DescriptorSet,
    /// Cached layout of the set
    pub layout: vk::DescriptorSetLayout,
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    resource: DescriptorResource,
}

/// Accumulates bindings for a single descriptor set
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    bindings: Vec<LayoutBinding>,
    writes: Vec<PendingWrite>,
    duplicate: Option<u32>,
}

impl DescriptorBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a buffer range at `binding`
    pub fn bind_buffer(
        &mut self,
        binding: u32,
        info: vk::DescriptorBufferInfo,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> &mut Self {
        self.push(binding, descriptor_type, stage_flags, DescriptorResource::Buffer(info))
    }

    /// Bind an image at `binding`
    pub fn bind_image(
        &mut self,
        binding: u32,
        info: vk::DescriptorImageInfo,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> &mut Self {
        self.push(binding, descriptor_type, stage_flags, DescriptorResource::Image(info))
    }

    /// Layout bindings collected so far, in bind order
    pub fn layout_bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    /// Whether nothing has been bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve the layout, allocate a set and write all bindings into it
    pub fn build(
        &self,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<BuiltDescriptorSet> {
        self.check_duplicates()?;
        let layout = cache.get_or_create(&self.bindings)?;
        let set = self.build_with_layout(layout, allocator)?;
        Ok(BuiltDescriptorSet { set, layout })
    }

    /// Allocate a set for an explicit layout and write all bindings into it
    pub fn build_with_layout(
        &self,
        layout: vk::DescriptorSetLayout,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<vk::DescriptorSet> {
        self.check_duplicates()?;
        let set = allocator.allocate(layout)?;

        let writes: Vec<DescriptorWrite> = self
            .writes
            .iter()
            .map(|pending| DescriptorWrite {
                set,
                binding: pending.binding,
                descriptor_type: pending.descriptor_type,
                resource: pending.resource,
            })
            .collect();

        if !writes.is_empty() {
            allocator.device().update_descriptor_sets(&writes);
        }
        Ok(set)
    }

    fn push(
        &mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        resource: DescriptorResource,
    ) -> &mut Self {
        if self.bindings.iter().any(|existing| existing.binding == binding) {
            self.duplicate.get_or_insert(binding);
            return self;
        }

        self.bindings
            .push(LayoutBinding::new(binding, descriptor_type, stage_flags));
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            resource,
        });
        self
    }

    fn check_duplicates(&self) -> VulkanResult<()> {
        match self.duplicate {
            Some(binding) => Err(VulkanError::DuplicateBinding { binding }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::testing::MockDevice;
    use ash::vk::Handle;

    fn buffer_info(raw: u64) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: vk::Buffer::from_raw(raw),
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }

    fn image_info(raw: u64) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: vk::Sampler::from_raw(raw),
            image_view: vk::ImageView::from_raw(raw + 1),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    #[test]
    fn test_build_writes_every_binding() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device.clone());
        let mut allocator = DescriptorAllocator::new(device.clone());

        let built = DescriptorBuilder::new()
            .bind_buffer(
                0,
                buffer_info(100),
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
            )
            .bind_image(
                1,
                image_info(200),
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            )
            .build(&mut cache, &mut allocator)
            .unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|write| write.set == built.set));

        let buffer_write = writes.iter().find(|write| write.binding == 0).unwrap();
        match buffer_write.resource {
            DescriptorResource::Buffer(info) => assert_eq!(info.buffer.as_raw(), 100),
            DescriptorResource::Image(_) => panic!("binding 0 should be a buffer"),
        }

        let image_write = writes.iter().find(|write| write.binding == 1).unwrap();
        assert_eq!(image_write.descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn test_bind_order_does_not_change_layout() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device.clone());
        let mut allocator = DescriptorAllocator::new(device.clone());

        let mut forward = DescriptorBuilder::new();
        forward
            .bind_buffer(0, buffer_info(1), vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)
            .bind_image(1, image_info(2), vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT);

        let mut reversed = DescriptorBuilder::new();
        reversed
            .bind_image(1, image_info(5), vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT)
            .bind_buffer(0, buffer_info(6), vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX);

        let a = forward.build(&mut cache, &mut allocator).unwrap();
        let b = reversed.build(&mut cache, &mut allocator).unwrap();

        assert_eq!(a.layout, b.layout);
        assert_ne!(a.set, b.set);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicate_binding_is_rejected_at_build() {
        let device = MockDevice::shared();
        let mut cache = DescriptorLayoutCache::new(device.clone());
        let mut allocator = DescriptorAllocator::new(device.clone());

        let mut builder = DescriptorBuilder::new();
        builder
            .bind_buffer(0, buffer_info(1), vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)
            .bind_buffer(0, buffer_info(2), vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX);

        let err = builder.build(&mut cache, &mut allocator).unwrap_err();
        assert!(matches!(err, VulkanError::DuplicateBinding { binding: 0 }));
        assert!(device.writes().is_empty());
        assert_eq!(device.stats().sets_allocated, 0);
    }

    #[test]
    fn test_explicit_layout_skips_cache() {
        let device = MockDevice::shared();
        let mut allocator = DescriptorAllocator::new(device.clone());
        let layout = vk::DescriptorSetLayout::from_raw(42);

        let mut builder = DescriptorBuilder::new();
        builder.bind_buffer(0, buffer_info(9), vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX);
        let set = builder.build_with_layout(layout, &mut allocator).unwrap();

        assert_ne!(set, vk::DescriptorSet::null());
        assert_eq!(device.stats().layouts_created, 0);
        assert_eq!(device.writes().len(), 1);
    }
}
