//! Descriptor sets shared by every object of a pass, one per frame in flight

use ash::vk;

use crate::render::backends::vulkan::descriptors::DescriptorBuilder;
use crate::render::backends::vulkan::resources::GpuResources;
use crate::render::backends::vulkan::shaders::ShaderEffect;
use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorLayoutCache, VulkanError, VulkanResult,
};
use crate::scene::{ObjectGpu, UniformSlot};

/// Set index of per-frame data
pub const PER_FRAME_SET: u32 = 0;

/// Set index of per-object data
pub const PER_OBJECT_SET: u32 = 1;

/// Accumulates set 0 bindings for each frame slot, then builds the sets
#[derive(Debug)]
pub struct PerFrameDescriptors {
    builders: Vec<DescriptorBuilder>,
    sets: Vec<vk::DescriptorSet>,
}

impl PerFrameDescriptors {
    /// One empty builder per frame in flight
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            builders: vec![DescriptorBuilder::new(); frames_in_flight],
            sets: Vec::new(),
        }
    }

    /// Bind a buffer to the set 0 binding named `name` for `frame`
    pub fn bind_buffer(
        &mut self,
        effect: &ShaderEffect,
        frame: usize,
        name: &str,
        info: vk::DescriptorBufferInfo,
        stages: vk::ShaderStageFlags,
    ) -> VulkanResult<()> {
        let (binding, descriptor_type) = per_frame_slot(effect, name)?;
        self.builder(frame)?.bind_buffer(binding, info, descriptor_type, stages);
        Ok(())
    }

    /// Bind an image to the set 0 binding named `name` for `frame`
    pub fn bind_image(
        &mut self,
        effect: &ShaderEffect,
        frame: usize,
        name: &str,
        info: vk::DescriptorImageInfo,
        stages: vk::ShaderStageFlags,
    ) -> VulkanResult<()> {
        let (binding, descriptor_type) = per_frame_slot(effect, name)?;
        self.builder(frame)?.bind_image(binding, info, descriptor_type, stages);
        Ok(())
    }

    /// Build and write one set per frame slot
    ///
    /// Each set must resolve to the effect's own set 0 layout, so every
    /// binding the shaders declare there has to be bound with matching stages.
    pub fn finish(
        &mut self,
        effect: &ShaderEffect,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<()> {
        let expected = effect
            .set_layout(PER_FRAME_SET)
            .ok_or_else(|| VulkanError::invalid("shader effect declares no per-frame set"))?;

        let mut sets = Vec::with_capacity(self.builders.len());
        for (frame, builder) in self.builders.iter().enumerate() {
            let built = builder.build(cache, allocator)?;
            if built.layout != expected {
                return Err(VulkanError::BindingConflict {
                    name: format!("set {}", PER_FRAME_SET),
                    reason: format!(
                        "frame {} bindings do not match the layout reflected from the shaders",
                        frame
                    ),
                });
            }
            sets.push(built.set);
        }

        self.sets = sets;
        Ok(())
    }

    /// Whether `finish` has produced the sets
    pub fn is_finished(&self) -> bool {
        !self.sets.is_empty()
    }

    /// Built set for `frame`
    pub fn set(&self, frame: usize) -> VulkanResult<vk::DescriptorSet> {
        self.sets.get(frame).copied().ok_or_else(|| {
            VulkanError::invalid(format!("no per-frame descriptor set for frame {}", frame))
        })
    }

    fn builder(&mut self, frame: usize) -> VulkanResult<&mut DescriptorBuilder> {
        if !self.sets.is_empty() {
            return Err(VulkanError::invalid("per-frame descriptors already built"));
        }
        self.builders
            .get_mut(frame)
            .ok_or_else(|| VulkanError::invalid(format!("frame slot {} out of range", frame)))
    }
}

fn per_frame_slot(effect: &ShaderEffect, name: &str) -> VulkanResult<(u32, vk::DescriptorType)> {
    let binding = effect.binding(name)?;
    if binding.set != PER_FRAME_SET {
        return Err(VulkanError::BindingConflict {
            name: name.to_string(),
            reason: format!("expected set {}, shaders declare set {}", PER_FRAME_SET, binding.set),
        });
    }
    Ok((binding.binding, binding.descriptor_type))
}

/// Uniform buffer plus set 1 descriptor set for each frame slot
///
/// Every slot gets its own buffer so a frame never rewrites data the GPU may
/// still be reading for another frame in flight.
pub(crate) fn provision_uniform_slots(
    effect: &ShaderEffect,
    name: &str,
    size: vk::DeviceSize,
    frames_in_flight: usize,
    resources: &mut dyn GpuResources,
    cache: &mut DescriptorLayoutCache,
    allocator: &mut DescriptorAllocator,
) -> VulkanResult<ObjectGpu> {
    let binding = effect.binding(name)?;
    let expected = effect.set_layout(binding.set);

    let mut slots = Vec::with_capacity(frames_in_flight);
    for _ in 0..frames_in_flight {
        let buffer = resources.create_uniform_buffer(size)?;
        let info = resources.buffer_info(buffer)?;

        let built = DescriptorBuilder::new()
            .bind_buffer(binding.binding, info, binding.descriptor_type, binding.stage_flags)
            .build(cache, allocator)?;
        if Some(built.layout) != expected {
            return Err(VulkanError::BindingConflict {
                name: name.to_string(),
                reason: format!("set {} holds bindings besides '{}'", binding.set, name),
            });
        }

        slots.push(UniformSlot {
            buffer,
            descriptor_set: built.set,
        });
    }
    Ok(ObjectGpu::Provisioned(slots))
}
