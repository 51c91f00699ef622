//! SPIR-V descriptor reflection
//!
//! Recovers descriptor bindings (set, binding, type, count, name) from compiled
//! shader bytecode using `spirq`. The stage is supplied by the caller since a
//! module may carry several entry points.

use std::collections::{BTreeMap, HashMap};

use ash::vk;

use crate::render::backends::vulkan::descriptors::LayoutBinding;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// One descriptor binding declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// Identifier of the variable in shader source
    pub name: String,
    /// Descriptor set index
    pub set: u32,
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Array element count (1 for non-arrays)
    pub count: u32,
    /// Stages that declare the binding
    pub stage_flags: vk::ShaderStageFlags,
}

impl ReflectedBinding {
    /// Layout-creation view of the binding
    pub fn layout_binding(&self) -> LayoutBinding {
        LayoutBinding {
            binding: self.binding,
            descriptor_type: self.descriptor_type,
            count: self.count,
            stage_flags: self.stage_flags,
        }
    }

    /// Location of the binding
    pub fn set_and_binding(&self) -> SetAndBinding {
        SetAndBinding {
            set: self.set,
            binding: self.binding,
            descriptor_type: self.descriptor_type,
        }
    }
}

/// Where a named binding lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAndBinding {
    /// Descriptor set index
    pub set: u32,
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
}

/// Reflection result for one shader stage
#[derive(Debug, Clone)]
pub struct ShaderReflection {
    stage: vk::ShaderStageFlags,
    bindings: Vec<ReflectedBinding>,
}

impl ShaderReflection {
    /// Stage the module was reflected for
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Bindings ordered by (set, binding)
    pub fn bindings(&self) -> &[ReflectedBinding] {
        &self.bindings
    }

    /// Consume into the binding list
    pub fn into_bindings(self) -> Vec<ReflectedBinding> {
        self.bindings
    }

    /// Name-keyed signature of the stage
    pub fn signature(&self) -> HashMap<String, SetAndBinding> {
        self.bindings
            .iter()
            .map(|binding| (binding.name.clone(), binding.set_and_binding()))
            .collect()
    }

    /// Layout bindings per set, densely indexed from set 0
    ///
    /// Sets that the shader skips are returned as empty binding lists.
    pub fn set_layouts(&self) -> Vec<Vec<LayoutBinding>> {
        dense_set_layouts(&self.bindings)
    }
}

/// Group bindings by set into a contiguous array starting at set 0
pub fn dense_set_layouts(bindings: &[ReflectedBinding]) -> Vec<Vec<LayoutBinding>> {
    let Some(max_set) = bindings.iter().map(|binding| binding.set).max() else {
        return Vec::new();
    };

    let mut sets = vec![Vec::new(); max_set as usize + 1];
    for binding in bindings {
        sets[binding.set as usize].push(binding.layout_binding());
    }
    for set in &mut sets {
        set.sort_by_key(|binding| binding.binding);
    }
    sets
}

/// Reinterpret SPIR-V bytes as little-endian words
pub fn spirv_words(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    if bytes.len() < 20 || bytes.len() % 4 != 0 {
        return Err(VulkanError::ShaderReflection(format!(
            "SPIR-V length {} is not a whole number of words",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(VulkanError::ShaderReflection(format!(
            "bad SPIR-V magic number {:#010x}",
            words[0]
        )));
    }
    Ok(words)
}

/// Reflect descriptor bindings from SPIR-V bytes
pub fn reflect(bytes: &[u8], stage: vk::ShaderStageFlags) -> VulkanResult<ShaderReflection> {
    let words = spirv_words(bytes)?;
    reflect_words(&words, stage)
}

/// Reflect descriptor bindings from SPIR-V words
pub fn reflect_words(code: &[u32], stage: vk::ShaderStageFlags) -> VulkanResult<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| VulkanError::ShaderReflection(format!("{:?}", e)))?;

    let mut by_slot: BTreeMap<(u32, u32), ReflectedBinding> = BTreeMap::new();

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            let spirq::var::Variable::Descriptor {
                name,
                desc_bind,
                desc_ty,
                nbind,
                ..
            } = var
            else {
                continue;
            };

            let set = desc_bind.set();
            let binding = desc_bind.bind();
            let descriptor_type = descriptor_type(desc_ty)?;
            let name = name
                .clone()
                .unwrap_or_else(|| format!("set{}_binding{}", set, binding));

            match by_slot.get(&(set, binding)) {
                Some(existing) if existing.descriptor_type != descriptor_type => {
                    return Err(VulkanError::BindingConflict {
                        name,
                        reason: format!(
                            "set {} binding {} declared as both {:?} and {:?}",
                            set, binding, existing.descriptor_type, descriptor_type
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    by_slot.insert(
                        (set, binding),
                        ReflectedBinding {
                            name,
                            set,
                            binding,
                            descriptor_type,
                            count: (*nbind).max(1),
                            stage_flags: stage,
                        },
                    );
                }
            }
        }
    }

    let bindings: Vec<ReflectedBinding> = by_slot.into_values().collect();
    log::trace!("Reflected {} binding(s) for {:?}", bindings.len(), stage);

    Ok(ShaderReflection { stage, bindings })
}

fn descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> VulkanResult<vk::DescriptorType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::Sampler() => Ok(vk::DescriptorType::SAMPLER),
        DescriptorType::CombinedImageSampler() => Ok(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        DescriptorType::SampledImage() => Ok(vk::DescriptorType::SAMPLED_IMAGE),
        DescriptorType::StorageImage(..) => Ok(vk::DescriptorType::STORAGE_IMAGE),
        DescriptorType::UniformTexelBuffer() => Ok(vk::DescriptorType::UNIFORM_TEXEL_BUFFER),
        DescriptorType::StorageTexelBuffer(..) => Ok(vk::DescriptorType::STORAGE_TEXEL_BUFFER),
        DescriptorType::UniformBuffer() => Ok(vk::DescriptorType::UNIFORM_BUFFER),
        DescriptorType::StorageBuffer(..) => Ok(vk::DescriptorType::STORAGE_BUFFER),
        DescriptorType::InputAttachment(..) => Ok(vk::DescriptorType::INPUT_ATTACHMENT),
        other => Err(VulkanError::ShaderReflection(format!(
            "unsupported descriptor type {:?}",
            other
        ))),
    }
}
