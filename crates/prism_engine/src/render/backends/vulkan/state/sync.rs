//! Semaphores, fences and per-frame synchronization sets

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device.create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device.wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization owned by one frame-in-flight slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when the slot's submission retires
    pub in_flight: Fence,
    /// Command buffer recorded for this slot
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    /// Create frame synchronization objects; the fence starts signaled
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
            command_buffer,
        })
    }
}

/// Which frame slot's fence last claimed each swapchain image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagesInFlight {
    owners: Vec<Option<usize>>,
}

impl ImagesInFlight {
    /// Table for `image_count` images, none claimed
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Record that `frame` now renders into `image`, returning the previous
    /// owner if it was a different slot
    pub fn claim(&mut self, image: u32, frame: usize) -> Option<usize> {
        let slot = self.owners.get_mut(image as usize)?;
        let previous = slot.replace(frame);
        previous.filter(|&owner| owner != frame)
    }

    /// Forget all claims, sized for a new swapchain
    pub fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_in_flight_reports_other_owner() {
        let mut table = ImagesInFlight::new(3);
        assert_eq!(table.claim(0, 0), None);
        assert_eq!(table.claim(1, 1), None);
        assert_eq!(table.claim(0, 1), Some(0));
        assert_eq!(table.claim(0, 1), None);
        assert_eq!(table.claim(7, 0), None);
    }

    #[test]
    fn test_images_in_flight_reset() {
        let mut table = ImagesInFlight::new(2);
        table.claim(0, 0);
        table.reset(4);
        assert_eq!(table.claim(0, 1), None);
        assert_eq!(table.claim(3, 1), None);
    }
}
