//! GPU memory resources: buffers, meshes, textures and their registry

pub mod buffer;
pub mod device_image;
pub mod image_data;
pub mod mesh;
pub mod registry;
pub mod texture;

pub use buffer::{find_memory_type, Buffer, MappedRegion};
pub use device_image::{aspect_for, DeviceImage, ImageSpec, TEXTURE_FORMAT};
pub use image_data::ImageData;
pub use mesh::{GpuMesh, MeshData, Vertex};
pub use registry::{
    BufferHandle, GpuResources, MeshDraw, MeshHandle, ResourceRegistry, TextureHandle, TexturePaths,
};
pub use texture::Texture;
