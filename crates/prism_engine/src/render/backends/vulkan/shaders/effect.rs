//! Shader effects: a vertex/fragment pair with one merged binding signature
//!
//! Both stages are reflected, their bindings merged by name, one cached set
//! layout is resolved per set index and a single pipeline layout spans the sets
//! contiguously. The names the engine intends to bind are checked once here,
//! so later lookups cannot fail on a typo in shader source.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ash::vk;

use super::reflection::{self, ReflectedBinding, SetAndBinding};
use crate::render::backends::vulkan::descriptors::DescriptorLayoutCache;
use crate::render::backends::vulkan::{SharedDevice, VulkanError, VulkanResult};

/// Highest number of descriptor sets an effect may declare
pub const MAX_SET_NUMBER: u32 = 10;

/// Highest binding index accepted within a set
pub const MAX_BINDING_NUMBER: u32 = 10;

/// Name-keyed binding signature merged across stages
#[derive(Debug, Clone, Default)]
pub struct BindingSignature {
    slots: BTreeMap<(u32, u32), ReflectedBinding>,
    names: HashMap<String, (u32, u32)>,
}

impl BindingSignature {
    /// Empty signature
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one stage's bindings
    ///
    /// A name seen before must map to the same set, binding, type and count;
    /// its stage flags are unioned. A slot shared by differently named
    /// variables must agree on type and count.
    pub fn merge(&mut self, bindings: &[ReflectedBinding]) -> VulkanResult<()> {
        for incoming in bindings {
            let slot = (incoming.set, incoming.binding);

            if let Some(&known_slot) = self.names.get(&incoming.name) {
                if known_slot != slot {
                    return Err(VulkanError::BindingConflict {
                        name: incoming.name.clone(),
                        reason: format!(
                            "declared at set {} binding {} and at set {} binding {}",
                            known_slot.0, known_slot.1, slot.0, slot.1
                        ),
                    });
                }
            }

            match self.slots.get_mut(&slot) {
                Some(existing) => {
                    if existing.descriptor_type != incoming.descriptor_type
                        || existing.count != incoming.count
                    {
                        return Err(VulkanError::BindingConflict {
                            name: incoming.name.clone(),
                            reason: format!(
                                "{:?}[{}] in one stage and {:?}[{}] in another",
                                existing.descriptor_type,
                                existing.count,
                                incoming.descriptor_type,
                                incoming.count
                            ),
                        });
                    }
                    existing.stage_flags |= incoming.stage_flags;
                }
                None => {
                    if incoming.set >= MAX_SET_NUMBER || incoming.binding >= MAX_BINDING_NUMBER {
                        return Err(VulkanError::BindingConflict {
                            name: incoming.name.clone(),
                            reason: format!(
                                "set {} binding {} exceeds the supported range",
                                incoming.set, incoming.binding
                            ),
                        });
                    }
                    self.slots.insert(slot, incoming.clone());
                }
            }

            self.names.insert(incoming.name.clone(), slot);
        }
        Ok(())
    }

    /// Binding declared under `name`
    pub fn get(&self, name: &str) -> Option<&ReflectedBinding> {
        self.names.get(name).and_then(|slot| self.slots.get(slot))
    }

    /// Whether `name` is declared by any merged stage
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Every declared name
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Merged bindings ordered by (set, binding)
    pub fn bindings(&self) -> impl Iterator<Item = &ReflectedBinding> {
        self.slots.values()
    }

    /// Number of distinct binding slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no stage declared any binding
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names from `expected` that no stage declares
    pub fn missing<'a>(&self, expected: &[&'a str]) -> Vec<&'a str> {
        expected
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }
}

/// Vertex and fragment shader pair with its pipeline layout
pub struct ShaderEffect {
    device: SharedDevice,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    signature: BindingSignature,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
}

impl ShaderEffect {
    /// Load, reflect and build an effect from SPIR-V files
    pub fn from_files(
        device: SharedDevice,
        cache: &mut DescriptorLayoutCache,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        expected_bindings: &[&str],
    ) -> VulkanResult<Self> {
        let vertex = read_shader(vertex_path.as_ref())?;
        let fragment = read_shader(fragment_path.as_ref())?;
        log::debug!(
            "Building shader effect from {:?} + {:?}",
            vertex_path.as_ref(),
            fragment_path.as_ref()
        );
        Self::from_bytecode(device, cache, &vertex, &fragment, expected_bindings)
    }

    /// Reflect and build an effect from in-memory SPIR-V
    pub fn from_bytecode(
        device: SharedDevice,
        cache: &mut DescriptorLayoutCache,
        vertex_code: &[u8],
        fragment_code: &[u8],
        expected_bindings: &[&str],
    ) -> VulkanResult<Self> {
        let vertex_words = reflection::spirv_words(vertex_code)?;
        let fragment_words = reflection::spirv_words(fragment_code)?;

        let vertex = reflection::reflect_words(&vertex_words, vk::ShaderStageFlags::VERTEX)?;
        let fragment = reflection::reflect_words(&fragment_words, vk::ShaderStageFlags::FRAGMENT)?;

        let mut signature = BindingSignature::new();
        signature.merge(vertex.bindings())?;
        signature.merge(fragment.bindings())?;

        let missing = signature.missing(expected_bindings);
        if !missing.is_empty() {
            return Err(VulkanError::MissingBindings {
                names: missing.into_iter().map(String::from).collect(),
            });
        }

        let mut effect = Self {
            device: device.clone(),
            vertex_module: vk::ShaderModule::null(),
            fragment_module: vk::ShaderModule::null(),
            signature,
            set_layouts: Vec::new(),
            pipeline_layout: vk::PipelineLayout::null(),
        };

        effect.vertex_module = device.create_shader_module(&vertex_words)?;
        effect.fragment_module = device.create_shader_module(&fragment_words)?;

        let merged: Vec<ReflectedBinding> = effect.signature.bindings().cloned().collect();
        for bindings in reflection::dense_set_layouts(&merged) {
            let layout = cache.get_or_create(&bindings)?;
            effect.set_layouts.push(layout);
        }

        effect.pipeline_layout = device.create_pipeline_layout(&effect.set_layouts)?;
        effect.log_signature();
        Ok(effect)
    }

    /// Location of a named binding; unknown names are an error
    pub fn set_and_binding(&self, name: &str) -> VulkanResult<SetAndBinding> {
        self.binding(name).map(ReflectedBinding::set_and_binding)
    }

    /// Full reflected binding for a name
    pub fn binding(&self, name: &str) -> VulkanResult<&ReflectedBinding> {
        self.signature
            .get(name)
            .ok_or_else(|| VulkanError::UnknownBinding { name: name.to_string() })
    }

    /// Merged signature
    pub fn signature(&self) -> &BindingSignature {
        &self.signature
    }

    /// Set layouts indexed by set number
    pub fn set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        &self.set_layouts
    }

    /// Layout of one set, if the effect spans it
    pub fn set_layout(&self, set: u32) -> Option<vk::DescriptorSetLayout> {
        self.set_layouts.get(set as usize).copied()
    }

    /// Pipeline layout spanning every set
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Vertex shader module
    pub fn vertex_module(&self) -> vk::ShaderModule {
        self.vertex_module
    }

    /// Fragment shader module
    pub fn fragment_module(&self) -> vk::ShaderModule {
        self.fragment_module
    }

    fn log_signature(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for binding in self.signature.bindings() {
            log::debug!(
                "  binding '{}' set={} binding={} type={:?} stages={:?}",
                binding.name,
                binding.set,
                binding.binding,
                binding.descriptor_type,
                binding.stage_flags
            );
        }
    }
}

impl Drop for ShaderEffect {
    fn drop(&mut self) {
        if self.pipeline_layout != vk::PipelineLayout::null() {
            self.device.destroy_pipeline_layout(self.pipeline_layout);
        }
        if self.fragment_module != vk::ShaderModule::null() {
            self.device.destroy_shader_module(self.fragment_module);
        }
        if self.vertex_module != vk::ShaderModule::null() {
            self.device.destroy_shader_module(self.vertex_module);
        }
    }
}

fn read_shader(path: &Path) -> VulkanResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| VulkanError::Io {
        path: path.display().to_string(),
        source,
    })
}
