//! Growable descriptor pool allocator
//!
//! Sets are carved from a current pool. When the pool reports exhaustion it is
//! retired and a replacement is taken from the free list or created fresh.
//! [`DescriptorAllocator::reset_all`] reclaims every pool at once, which
//! invalidates every set handed out before the reset.

use ash::vk;

use crate::render::backends::vulkan::{SharedDevice, VulkanError, VulkanResult};

/// Per-type pool sizing as a multiple of the pool's set capacity
///
/// The ratios are a heuristic guess at future demand, not an exact count.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSizes {
    ratios: Vec<(vk::DescriptorType, f32)>,
}

impl PoolSizes {
    /// Custom ratio table
    pub fn new(ratios: impl IntoIterator<Item = (vk::DescriptorType, f32)>) -> Self {
        Self {
            ratios: ratios.into_iter().collect(),
        }
    }

    /// Descriptor counts for a pool holding `max_sets` sets
    pub fn pool_sizes(&self, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
        self.ratios
            .iter()
            .map(|&(ty, ratio)| vk::DescriptorPoolSize {
                ty,
                descriptor_count: ((ratio * max_sets as f32) as u32).max(1),
            })
            .collect()
    }
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self::new([
            (vk::DescriptorType::SAMPLER, 0.5),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4.0),
            (vk::DescriptorType::SAMPLED_IMAGE, 4.0),
            (vk::DescriptorType::STORAGE_IMAGE, 1.0),
            (vk::DescriptorType::UNIFORM_TEXEL_BUFFER, 1.0),
            (vk::DescriptorType::STORAGE_TEXEL_BUFFER, 1.0),
            (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
            (vk::DescriptorType::STORAGE_BUFFER, 2.0),
            (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1.0),
            (vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, 1.0),
            (vk::DescriptorType::INPUT_ATTACHMENT, 0.5),
        ])
    }
}

/// Default number of sets each pool is sized for
pub const DEFAULT_SETS_PER_POOL: u32 = 1000;

/// Descriptor set allocator over a list of pools
pub struct DescriptorAllocator {
    device: SharedDevice,
    pool_sizes: PoolSizes,
    sets_per_pool: u32,
    current_pool: Option<vk::DescriptorPool>,
    used_pools: Vec<vk::DescriptorPool>,
    free_pools: Vec<vk::DescriptorPool>,
}

impl DescriptorAllocator {
    /// Allocator with the default ratio table and pool capacity
    pub fn new(device: SharedDevice) -> Self {
        Self::with_pool_sizes(device, PoolSizes::default(), DEFAULT_SETS_PER_POOL)
    }

    /// Allocator with explicit sizing
    pub fn with_pool_sizes(device: SharedDevice, pool_sizes: PoolSizes, sets_per_pool: u32) -> Self {
        Self {
            device,
            pool_sizes,
            sets_per_pool: sets_per_pool.max(1),
            current_pool: None,
            used_pools: Vec::new(),
            free_pools: Vec::new(),
        }
    }

    /// Allocate a set for `layout`, spilling into a new pool when needed
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let pool = match self.current_pool {
            Some(pool) => pool,
            None => self.switch_pool()?,
        };

        match self.device.allocate_descriptor_set(pool, layout) {
            Ok(set) => return Ok(set),
            Err(vk::Result::ERROR_FRAGMENTED_POOL | vk::Result::ERROR_OUT_OF_POOL_MEMORY) => {
                log::trace!("Descriptor pool {:?} exhausted, switching pools", pool);
            }
            Err(err) => return Err(VulkanError::Api(err)),
        }

        let pool = self.switch_pool()?;
        self.device
            .allocate_descriptor_set(pool, layout)
            .map_err(VulkanError::DescriptorPoolExhausted)
    }

    /// Reset every pool and return it to the free list
    ///
    /// Pools are reset in place and only move to the free list once every
    /// reset succeeded; on failure all of them stay owned as used pools.
    pub fn reset_all(&mut self) -> VulkanResult<()> {
        for &pool in &self.used_pools {
            self.device.reset_descriptor_pool(pool)?;
        }
        self.free_pools.append(&mut self.used_pools);
        self.current_pool = None;
        log::debug!("Descriptor pools reset, {} free", self.free_pools.len());
        Ok(())
    }

    /// Pools currently holding live sets
    pub fn used_pool_count(&self) -> usize {
        self.used_pools.len()
    }

    /// Pools ready for reuse
    pub fn free_pool_count(&self) -> usize {
        self.free_pools.len()
    }

    /// Shared device the allocator writes through
    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    fn switch_pool(&mut self) -> VulkanResult<vk::DescriptorPool> {
        let pool = self.grab_pool()?;
        self.used_pools.push(pool);
        self.current_pool = Some(pool);
        Ok(pool)
    }

    fn grab_pool(&mut self) -> VulkanResult<vk::DescriptorPool> {
        if let Some(pool) = self.free_pools.pop() {
            return Ok(pool);
        }

        let sizes = self.pool_sizes.pool_sizes(self.sets_per_pool);
        let pool = self.device.create_descriptor_pool(self.sets_per_pool, &sizes)?;
        log::debug!(
            "Created descriptor pool {:?} for {} sets",
            pool,
            self.sets_per_pool
        );
        Ok(pool)
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.used_pools.drain(..).chain(self.free_pools.drain(..)) {
            self.device.destroy_descriptor_pool(pool);
        }
    }
}
