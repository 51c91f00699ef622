//! Handle-based ownership of meshes, textures and uniform buffers
//!
//! Scene objects hold [`MeshHandle`] and [`BufferHandle`] keys instead of
//! shared pointers. Render systems reach the GPU objects through the
//! [`GpuResources`] trait. Textures loaded from disk are keyed by path so a
//! file is uploaded once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ash::{vk, Device};
use slotmap::{new_key_type, Key, SlotMap};

use super::buffer::Buffer;
use super::image_data::ImageData;
use super::mesh::{GpuMesh, MeshData};
use super::texture::Texture;
use crate::render::backends::vulkan::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

new_key_type! {
    /// Key of an uploaded mesh
    pub struct MeshHandle;
    /// Key of an uploaded texture
    pub struct TextureHandle;
    /// Key of a host-visible uniform buffer
    pub struct BufferHandle;
}

/// What an indexed draw of one mesh needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDraw {
    /// Vertex buffer bound at slot 0
    pub vertex_buffer: vk::Buffer,
    /// u32 index buffer
    pub index_buffer: vk::Buffer,
    /// Number of indices
    pub index_count: u32,
}

/// GPU resource access used by render systems
pub trait GpuResources {
    /// Allocate a host-visible uniform buffer
    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> VulkanResult<BufferHandle>;

    /// Write bytes into a uniform buffer
    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, bytes: &[u8]) -> VulkanResult<()>;

    /// Descriptor info covering a whole uniform buffer
    fn buffer_info(&self, handle: BufferHandle) -> VulkanResult<vk::DescriptorBufferInfo>;

    /// Buffers and index count for drawing a mesh
    fn mesh_draw(&self, handle: MeshHandle) -> VulkanResult<MeshDraw>;

    /// Release a uniform buffer
    ///
    /// No submitted frame may still read it; wait for the device or for
    /// every frame in flight to retire first.
    fn destroy_buffer(&mut self, handle: BufferHandle) -> VulkanResult<()>;
}

/// Texture handles keyed by the file they were loaded from
///
/// `a/./b.png` and `a/b.png` name the same entry.
#[derive(Debug, Default)]
pub struct TexturePaths {
    by_path: HashMap<PathBuf, TextureHandle>,
}

impl TexturePaths {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> PathBuf {
        path.components().collect()
    }

    /// Handle previously loaded from `path`
    pub fn get(&self, path: &Path) -> Option<TextureHandle> {
        self.by_path.get(&Self::key(path)).copied()
    }

    /// Return the handle for `path`, running `load` only the first time
    ///
    /// A failed load is not remembered.
    pub fn get_or_load<F>(&mut self, path: &Path, load: F) -> VulkanResult<TextureHandle>
    where
        F: FnOnce(&Path) -> VulkanResult<TextureHandle>,
    {
        let key = Self::key(path);
        if let Some(&handle) = self.by_path.get(&key) {
            return Ok(handle);
        }
        let handle = load(path)?;
        self.by_path.insert(key, handle);
        Ok(handle)
    }

    /// Number of distinct paths loaded
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether nothing was loaded from disk
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// `ResourceNotFound` naming the raw slotmap key
pub(crate) fn not_found<K: Key>(key: K) -> VulkanError {
    VulkanError::ResourceNotFound {
        id: key.data().as_ffi(),
    }
}

/// Owner of every mesh, texture and uniform buffer on the device
pub struct ResourceRegistry {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    upload_pool: CommandPool,
    meshes: SlotMap<MeshHandle, GpuMesh>,
    textures: SlotMap<TextureHandle, Texture>,
    texture_paths: TexturePaths,
    buffers: SlotMap<BufferHandle, Buffer>,
}

impl ResourceRegistry {
    /// Create a registry that uploads through `queue`
    pub fn new(
        device: Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> VulkanResult<Self> {
        let upload_pool = CommandPool::new(device.clone(), queue_family_index)?;
        Ok(Self {
            device,
            memory_properties,
            queue,
            upload_pool,
            meshes: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            texture_paths: TexturePaths::new(),
            buffers: SlotMap::with_key(),
        })
    }

    /// Upload a mesh to device-local memory
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> VulkanResult<MeshHandle> {
        let gpu_mesh = GpuMesh::upload(
            &self.device,
            &self.memory_properties,
            &self.upload_pool,
            self.queue,
            mesh,
        )?;
        Ok(self.meshes.insert(gpu_mesh))
    }

    /// Upload RGBA8 pixels as a sampled texture
    pub fn upload_texture(&mut self, image: &ImageData) -> VulkanResult<TextureHandle> {
        let texture = Texture::upload(
            &self.device,
            &self.memory_properties,
            &self.upload_pool,
            self.queue,
            image,
        )?;
        Ok(self.textures.insert(texture))
    }

    /// Decode and upload the image at `path`, or return the texture already
    /// loaded from it
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> VulkanResult<TextureHandle> {
        let Self {
            device,
            memory_properties,
            queue,
            upload_pool,
            textures,
            texture_paths,
            ..
        } = self;
        texture_paths.get_or_load(path.as_ref(), |path| {
            let image = ImageData::from_file(path)?;
            let texture = Texture::upload(device, memory_properties, upload_pool, *queue, &image)?;
            log::info!("Loaded texture {} ({}x{})", path.display(), image.width, image.height);
            Ok(textures.insert(texture))
        })
    }

    /// Texture previously loaded from `path`
    pub fn texture_for_path(&self, path: impl AsRef<Path>) -> Option<TextureHandle> {
        self.texture_paths.get(path.as_ref())
    }

    /// Combined image sampler info for a texture
    pub fn texture_info(&self, handle: TextureHandle) -> VulkanResult<vk::DescriptorImageInfo> {
        self.textures
            .get(handle)
            .map(Texture::descriptor_info)
            .ok_or_else(|| not_found(handle))
    }

    /// Number of live meshes, textures and buffers
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.meshes.len(), self.textures.len(), self.buffers.len())
    }
}

impl GpuResources for ResourceRegistry {
    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> VulkanResult<BufferHandle> {
        let buffer = Buffer::uniform(self.device.clone(), &self.memory_properties, size)?;
        Ok(self.buffers.insert(buffer))
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, bytes: &[u8]) -> VulkanResult<()> {
        self.buffers
            .get_mut(handle)
            .ok_or_else(|| not_found(handle))?
            .write_bytes(offset as usize, bytes)
    }

    fn buffer_info(&self, handle: BufferHandle) -> VulkanResult<vk::DescriptorBufferInfo> {
        self.buffers
            .get(handle)
            .map(Buffer::descriptor_info)
            .ok_or_else(|| not_found(handle))
    }

    fn mesh_draw(&self, handle: MeshHandle) -> VulkanResult<MeshDraw> {
        self.meshes
            .get(handle)
            .map(|mesh| MeshDraw {
                vertex_buffer: mesh.vertex_buffer(),
                index_buffer: mesh.index_buffer(),
                index_count: mesh.index_count(),
            })
            .ok_or_else(|| not_found(handle))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> VulkanResult<()> {
        self.buffers
            .remove(handle)
            .map(drop)
            .ok_or_else(|| not_found(handle))
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        self.meshes.clear();
        self.textures.clear();
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_is_uploaded_once() {
        let mut textures: SlotMap<TextureHandle, PathBuf> = SlotMap::with_key();
        let mut paths = TexturePaths::new();
        let mut upload = |path: &Path| -> VulkanResult<TextureHandle> { Ok(textures.insert(path.to_path_buf())) };

        let first = paths.get_or_load(Path::new("textures/checker.png"), &mut upload).unwrap();
        let again = paths.get_or_load(Path::new("textures/./checker.png"), &mut upload).unwrap();
        let other = paths.get_or_load(Path::new("textures/stone.png"), &mut upload).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(textures.len(), 2);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths.get(Path::new("textures/checker.png")), Some(first));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let mut textures: SlotMap<TextureHandle, ()> = SlotMap::with_key();
        let mut paths = TexturePaths::new();
        let path = Path::new("missing.png");

        let err = paths
            .get_or_load(path, |_| Err(VulkanError::invalid("decode failed")))
            .unwrap_err();
        assert!(matches!(err, VulkanError::InvalidOperation { .. }));
        assert!(paths.is_empty());

        let handle = paths.get_or_load(path, |_| Ok(textures.insert(()))).unwrap();
        assert_eq!(paths.get(path), Some(handle));
        assert_eq!(textures.len(), 1);
    }
}
