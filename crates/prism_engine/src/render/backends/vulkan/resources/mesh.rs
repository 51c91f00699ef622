//! Vertex format and GPU mesh storage

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};

use super::buffer::Buffer;
use crate::render::backends::vulkan::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Interleaved vertex consumed by the simple shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Single interleaved binding at slot 0
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// Locations 0..=3: position, color, normal, uv
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32B32_SFLOAT, 12),
            attribute(2, vk::Format::R32G32B32_SFLOAT, 24),
            attribute(3, vk::Format::R32G32_SFLOAT, 36),
        ]
    }
}

/// CPU-side indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create mesh data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Check that the mesh forms whole triangles and every index is in range
    pub fn validate(&self) -> VulkanResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(VulkanError::invalid("mesh has no geometry"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(VulkanError::invalid(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(index) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(VulkanError::invalid(format!(
                "index {} out of range for {} vertices",
                index, vertex_count
            )));
        }
        Ok(())
    }
}

/// Device-local vertex and index buffers for one mesh
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl GpuMesh {
    /// Upload `mesh` through staging buffers
    pub fn upload(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        pool: &CommandPool,
        queue: vk::Queue,
        mesh: &MeshData,
    ) -> VulkanResult<Self> {
        mesh.validate()?;

        let vertex_buffer = upload_device_local(
            device,
            memory_properties,
            pool,
            queue,
            bytemuck::cast_slice(&mesh.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = upload_device_local(
            device,
            memory_properties,
            pool,
            queue,
            bytemuck::cast_slice(&mesh.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        log::debug!(
            "Uploaded mesh with {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

fn upload_device_local(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    pool: &CommandPool,
    queue: vk::Queue,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let staging = Buffer::staging(device.clone(), memory_properties, bytes)?;
    let target = Buffer::new(
        device.clone(),
        memory_properties,
        bytes.len() as vk::DeviceSize,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: bytes.len() as vk::DeviceSize,
    };
    pool.submit_once(queue, |device, command_buffer| unsafe {
        device.cmd_copy_buffer(command_buffer, staging.handle(), target.handle(), &[region]);
    })?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData::new(vec![Vertex::default(); 3], vec![0, 1, 2])
    }

    #[test]
    fn test_vertex_layout_matches_attributes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 4);
        assert_eq!(attributes[3].offset, 36);
        assert_eq!(Vertex::binding_descriptions()[0].stride, 44);
    }

    #[test]
    fn test_valid_mesh() {
        assert!(triangle().validate().is_ok());
    }

    #[test]
    fn test_mesh_with_partial_triangle_is_rejected() {
        let mut mesh = triangle();
        mesh.indices.push(0);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_mesh_with_out_of_range_index_is_rejected() {
        let mut mesh = triangle();
        mesh.indices[2] = 3;
        assert!(mesh.validate().is_err());
        assert!(MeshData::default().validate().is_err());
    }
}
