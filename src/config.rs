// =============================================================================
// CONFIGURATION - Load settings from voxin.toml
// =============================================================================
//
// Replaces compile-time globals (window size, extension and layer lists) with
// one value handed to `GraphicsContext::new`. Missing file or fields fall back
// to defaults.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the device extension every configuration must request.
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

const KHRONOS_VALIDATION: &str = "VK_LAYER_KHRONOS_validation";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub vulkan: VulkanConfig,
    pub render: RenderConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Voxin".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Instance and device setup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VulkanConfig {
    pub required_device_extensions: Vec<String>,
    pub validation_layers: Vec<String>,
    /// Gates validation layers and the debug messenger.
    pub debug_mode: bool,
    pub device_selection: DeviceSelection,
    pub present_mode: PresentModePreference,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        let validation_layers = if cfg!(debug_assertions) {
            vec![KHRONOS_VALIDATION.to_string()]
        } else {
            Vec::new()
        };

        Self {
            required_device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            validation_layers,
            debug_mode: cfg!(debug_assertions),
            device_selection: DeviceSelection::default(),
            present_mode: PresentModePreference::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelection {
    /// First device that passes the suitability check, in driver order.
    #[default]
    FirstSuitable,
    /// Rank suitable devices by type, then by device-local memory.
    PreferDiscrete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    #[default]
    Mailbox,
    Immediate,
    Fifo,
    FifoRelaxed,
}

impl PresentModePreference {
    pub fn as_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }
}

/// Rendering settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames_in_flight: 1,
            vertex_shader: PathBuf::from("shaders/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

impl Config {
    /// Load configuration from `voxin.toml`, falling back to defaults on error
    pub fn load() -> Self {
        Self::load_from_path("voxin.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load voxin.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings the renderer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            anyhow::bail!(
                "window size must be non-zero, got {}x{}",
                self.window.width,
                self.window.height
            );
        }

        if !self
            .vulkan
            .required_device_extensions
            .iter()
            .any(|ext| ext == SWAPCHAIN_EXTENSION)
        {
            anyhow::bail!("required_device_extensions must include {}", SWAPCHAIN_EXTENSION);
        }

        if self.render.max_frames_in_flight != 1 {
            anyhow::bail!(
                "max_frames_in_flight = {} is not supported, only 1 frame in flight",
                self.render.max_frames_in_flight
            );
        }

        Ok(())
    }

    /// Layers actually passed to the driver: empty unless debug mode is on.
    pub fn enabled_validation_layers(&self) -> &[String] {
        if self.vulkan.debug_mode {
            &self.vulkan.validation_layers
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_open_voxin_800x600() {
        let config = Config::default();
        assert_eq!(config.window.title, "Voxin");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(
            config.vulkan.required_device_extensions,
            vec![SWAPCHAIN_EXTENSION.to_string()]
        );
        assert_eq!(config.render.max_frames_in_flight, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_layers_follow_build_profile() {
        let config = Config::default();
        assert_eq!(config.vulkan.debug_mode, cfg!(debug_assertions));
        assert_eq!(
            config.vulkan.validation_layers.is_empty(),
            !cfg!(debug_assertions)
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [window]
            title = "Test"

            [vulkan]
            debug_mode = false
            device_selection = "prefer_discrete"
            present_mode = "fifo_relaxed"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.width, 800);
        assert!(!config.vulkan.debug_mode);
        assert_eq!(config.vulkan.device_selection, DeviceSelection::PreferDiscrete);
        assert_eq!(config.vulkan.present_mode, PresentModePreference::FifoRelaxed);
        assert_eq!(config.vulkan.present_mode.as_vk(), vk::PresentModeKHR::FIFO_RELAXED);
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        let result = Config::from_toml("[vulkan]\npresent_mode = \"vsync\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn layers_disabled_outside_debug_mode() {
        let mut config = Config::default();
        config.vulkan.validation_layers = vec![KHRONOS_VALIDATION.to_string()];

        config.vulkan.debug_mode = false;
        assert!(config.enabled_validation_layers().is_empty());

        config.vulkan.debug_mode = true;
        assert_eq!(config.enabled_validation_layers().len(), 1);
    }

    #[test]
    fn validate_requires_swapchain_extension() {
        let mut config = Config::default();
        config.vulkan.required_device_extensions.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(SWAPCHAIN_EXTENSION));
    }

    #[test]
    fn validate_rejects_zero_size_and_extra_frames() {
        let mut config = Config::default();
        config.window.height = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.max_frames_in_flight = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("does/not/exist/voxin.toml").unwrap();
        assert_eq!(config.window.title, "Voxin");
    }
}
