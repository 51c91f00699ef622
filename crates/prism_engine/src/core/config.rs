//! Renderer configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Compiled shader locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory holding the SPIR-V files
    pub directory: PathBuf,
    /// Vertex shader of the mesh pass
    pub simple_vertex: String,
    /// Fragment shader of the mesh pass
    pub simple_fragment: String,
    /// Vertex shader of the light billboard pass
    pub point_light_vertex: String,
    /// Fragment shader of the light billboard pass
    pub point_light_fragment: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("target/shaders"),
            simple_vertex: "simple_shader.vert.spv".to_string(),
            simple_fragment: "simple_shader.frag.spv".to_string(),
            point_light_vertex: "point_light.vert.spv".to_string(),
            point_light_fragment: "point_light.frag.spv".to_string(),
        }
    }
}

impl ShaderConfig {
    /// Shaders under a different directory
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Vertex and fragment paths of the mesh pass
    pub fn simple_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.directory.join(&self.simple_vertex),
            self.directory.join(&self.simple_fragment),
        )
    }

    /// Vertex and fragment paths of the light pass
    pub fn point_light_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.directory.join(&self.point_light_vertex),
            self.directory.join(&self.point_light_fragment),
        )
    }
}

/// Initial window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
    /// Title bar text
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Prism".to_string(),
        }
    }
}

/// Descriptor pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Sets each pool is created for
    pub sets_per_pool: u32,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self { sets_per_pool: 1000 }
    }
}

/// Everything needed to bring up the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Window settings
    pub window: WindowConfig,
    /// Frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Color the swapchain image is cleared to
    pub clear_color: [f32; 4],
    /// Whether to enable Vulkan validation layers
    pub enable_validation: bool,
    /// FIFO presentation when set, mailbox when available otherwise
    pub vsync: bool,
    /// Descriptor pool sizing
    pub descriptors: DescriptorConfig,
    /// Shader locations
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Prism Demo".to_string(),
            application_version: (0, 1, 0),
            window: WindowConfig::default(),
            max_frames_in_flight: 2,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            descriptors: DescriptorConfig::default(),
            shaders: ShaderConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Defaults with a different application name
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Set window size and title
    pub fn with_window(mut self, width: u32, height: u32, title: impl Into<String>) -> Self {
        self.window = WindowConfig {
            width,
            height,
            title: title.into(),
        };
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    /// Enable or disable vsync
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Vulkan-encoded application version
    pub fn vulkan_version(&self) -> u32 {
        let (major, minor, patch) = self.application_version;
        ash::vk::make_api_version(0, major, minor, patch)
    }
}

impl Config for RendererConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window extent {}x{} has a zero dimension",
                self.window.width, self.window.height
            )));
        }
        if self.descriptors.sets_per_pool == 0 {
            return Err(ConfigError::Invalid(
                "descriptors.sets_per_pool must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("prism_config_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.descriptors.sets_per_pool, 1000);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let zero_frames = RendererConfig::default().with_max_frames_in_flight(0);
        assert!(matches!(zero_frames.validate(), Err(ConfigError::Invalid(_))));

        let zero_window = RendererConfig::default().with_window(0, 600, "x");
        assert!(zero_window.validate().is_err());

        let mut zero_pool = RendererConfig::default();
        zero_pool.descriptors.sets_per_pool = 0;
        assert!(zero_pool.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let path = temp_path("partial.toml");
        std::fs::write(&path, "max_frames_in_flight = 3\n\n[window]\ntitle = \"Lights\"\n").unwrap();

        let config = RendererConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.window.title, "Lights");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.shaders, ShaderConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected_on_load() {
        let path = temp_path("invalid.toml");
        std::fs::write(&path, "max_frames_in_flight = 0\n").unwrap();
        let result = RendererConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_ron_save_and_load() {
        let path = temp_path("saved.ron");
        let config = RendererConfig::new("Saved").with_vsync(false);
        config.save_to_file(&path).unwrap();
        let loaded = RendererConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_extension_and_missing_file() {
        assert!(matches!(
            RendererConfig::default().save_to_file("prism.yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        let fallback = RendererConfig::load_or_default(temp_path("absent.toml")).unwrap();
        assert_eq!(fallback, RendererConfig::default());
    }

    #[test]
    fn test_shader_paths_join_directory() {
        let shaders = ShaderConfig::default().with_directory("assets");
        let (vertex, fragment) = shaders.point_light_paths();
        assert_eq!(vertex, PathBuf::from("assets/point_light.vert.spv"));
        assert_eq!(fragment, PathBuf::from("assets/point_light.frag.spv"));
    }
}
