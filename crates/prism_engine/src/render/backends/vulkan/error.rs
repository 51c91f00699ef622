//! Vulkan backend error types

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Resource with specified ID could not be found
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// The unique identifier of the resource
        id: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader bytecode could not be reflected
    #[error("Shader reflection failed: {0}")]
    ShaderReflection(String),

    /// Lookup of a binding name that no shader stage declares
    #[error("Unknown shader binding '{name}'")]
    UnknownBinding {
        /// The requested binding name
        name: String,
    },

    /// A binding name or slot declared inconsistently between stages
    #[error("Binding conflict for '{name}': {reason}")]
    BindingConflict {
        /// Binding name involved in the conflict
        name: String,
        /// What did not match
        reason: String,
    },

    /// Names the engine expects but the shaders do not declare
    #[error("Shader effect is missing expected bindings: {names:?}")]
    MissingBindings {
        /// Every expected name absent from the merged signature
        names: Vec<String>,
    },

    /// The same binding index was bound twice in one descriptor builder
    #[error("Binding index {binding} bound more than once")]
    DuplicateBinding {
        /// The repeated binding index
        binding: u32,
    },

    /// A freshly created pool could not satisfy a single allocation
    #[error("Descriptor set does not fit in a fresh pool: {0:?}")]
    DescriptorPoolExhausted(vk::Result),

    /// File system failure while loading shaders or assets
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path being read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Image decoding failed
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// Renderer configuration could not be loaded or is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl VulkanError {
    /// Shorthand for an [`VulkanError::InvalidOperation`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into() }
    }
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
