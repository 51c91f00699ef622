//! Buffer management for vertex data and uniforms
//!
//! Host-visible buffers stay persistently mapped; all CPU writes go through a
//! bounds-checked [`MappedRegion`].

use std::ptr::NonNull;

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Host-visible memory range that the CPU may write into
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// The region is only touched through &mut self or &self on the recording thread
unsafe impl Send for MappedRegion {}

impl MappedRegion {
    /// Wrap a mapped pointer
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for the whole
    /// lifetime of the region.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    /// Size of the region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is zero sized
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `bytes` to `offset`
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> VulkanResult<()> {
        self.check_range(offset, bytes.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(offset), bytes.len());
        }
        Ok(())
    }

    /// Copy a plain-old-data value to `offset`
    pub fn write_pod<T: bytemuck::Pod>(&mut self, offset: usize, value: &T) -> VulkanResult<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    /// View `len` bytes starting at `offset`
    pub fn read_bytes(&self, offset: usize, len: usize) -> VulkanResult<&[u8]> {
        self.check_range(offset, len)?;
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) })
    }

    fn check_range(&self, offset: usize, len: usize) -> VulkanResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(VulkanError::InvalidOperation {
                reason: format!(
                    "write of {} bytes at offset {} exceeds mapped size {}",
                    len, offset, self.len
                ),
            }),
        }
    }
}

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<MappedRegion>,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            memory_properties,
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(err));
            }
        };

        let mut result = Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        };

        unsafe {
            result.device.bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        result.with_mapping_if(properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE))
    }

    /// Host-visible, coherent uniform buffer
    pub fn uniform(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Host-visible staging buffer filled with `bytes`
    pub fn staging(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        let mut staging = Self::new(
            device,
            memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(0, bytes)?;
        Ok(staging)
    }

    fn with_mapping_if(mut self, host_visible: bool) -> VulkanResult<Self> {
        if host_visible {
            let ptr = unsafe {
                self.device
                    .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                    .map_err(VulkanError::Api)?
            };
            self.mapped = unsafe { MappedRegion::from_raw(ptr.cast::<u8>(), self.size as usize) };
        }
        Ok(self)
    }

    /// Write bytes through the persistent mapping
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> VulkanResult<()> {
        self.mapped
            .as_mut()
            .ok_or_else(|| VulkanError::invalid("buffer is not host visible"))?
            .write_bytes(offset, bytes)
    }

    /// Descriptor info covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find a memory type matching `type_filter` with all `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Sample {
        a: [f32; 4],
        b: u32,
        _pad: [u32; 3],
    }

    #[test]
    fn test_mapped_write_round_trip() {
        let mut backing = vec![0u8; 64];
        let mut region = unsafe { MappedRegion::from_raw(backing.as_mut_ptr(), backing.len()) }.unwrap();

        let sample = Sample {
            a: [1.0, -2.5, 3.25, 0.0],
            b: 0xDEAD_BEEF,
            _pad: [0; 3],
        };
        region.write_pod(16, &sample).unwrap();

        let read = region.read_bytes(16, std::mem::size_of::<Sample>()).unwrap();
        assert_eq!(read, bytemuck::bytes_of(&sample));
        assert!(region.read_bytes(0, 16).unwrap().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_write_past_end_is_rejected() {
        let mut backing = vec![0u8; 8];
        let mut region = unsafe { MappedRegion::from_raw(backing.as_mut_ptr(), backing.len()) }.unwrap();

        assert!(region.write_bytes(4, &[1, 2, 3, 4]).is_ok());
        assert!(region.write_bytes(5, &[1, 2, 3, 4]).is_err());
        assert!(region.write_bytes(usize::MAX, &[1]).is_err());
        assert_eq!(region.read_bytes(4, 4).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_null_pointer_is_not_a_region() {
        assert!(unsafe { MappedRegion::from_raw(std::ptr::null_mut(), 16) }.is_none());
    }

    #[test]
    fn test_find_memory_type_respects_filter_and_flags() {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = 3;
        properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        properties.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties.memory_types[2].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&properties, 0b111, host).unwrap(), 1);
        assert!(matches!(
            find_memory_type(&properties, 0b101, host),
            Err(VulkanError::NoSuitableMemoryType)
        ));
    }
}
