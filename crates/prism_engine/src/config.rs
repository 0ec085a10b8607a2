//! Engine configuration
//!
//! A single immutable value set supplied at startup. Defaults match a
//! two-frames-in-flight renderer with the Khronos validation layer enabled
//! in debug builds; a TOML file can override any field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read from disk
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file contents were not valid TOML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field held a value the renderer cannot operate with
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Renderer configuration, immutable after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Window title
    pub window_title: String,
    /// Initial window width in screen coordinates
    pub window_width: u32,
    /// Initial window height in screen coordinates
    pub window_height: u32,
    /// Enable the Vulkan validation layers listed in `validation_layers`
    pub enable_validation: bool,
    /// Number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Instance layers required when `enable_validation` is set
    pub validation_layers: Vec<String>,
    /// Device extensions required of any selected physical device
    pub device_extensions: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_title: "Prism".to_string(),
            window_width: 1280,
            window_height: 720,
            enable_validation: cfg!(debug_assertions),
            max_frames_in_flight: 2,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            device_extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }
}

impl RenderConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// fields the file omits.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid(
                "window dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_two_frames_in_flight() {
        let config = RenderConfig::default();
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.validation_layers, ["VK_LAYER_KHRONOS_validation"]);
        assert_eq!(config.device_extensions, ["VK_KHR_swapchain"]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RenderConfig = toml::from_str("window_title = \"demo\"\n").unwrap();
        assert_eq!(config.window_title, "demo");
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.window_width, 1280);
    }

    #[test]
    fn toml_round_trip() {
        let config = RenderConfig {
            max_frames_in_flight: 3,
            ..RenderConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        let back: RenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.max_frames_in_flight, 3);
        assert_eq!(back.window_title, config.window_title);
    }

    #[test]
    fn zero_frames_in_flight_rejected() {
        let config = RenderConfig {
            max_frames_in_flight: 0,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
