// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub shader_dir: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
    /// Empty means log to stderr
    pub log_file: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_or_default("config.toml")
    }

    /// Like `load_from_path`, but an unreadable or malformed file gives defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_path(path).unwrap_or_else(|e| {
            // Logging is not up yet at this point
            eprintln!("{:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject settings that would only fail later inside Vulkan
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            anyhow::bail!(
                "Window size must be non-zero, got {}x{}",
                self.window.width,
                self.window.height
            );
        }

        if self.graphics.shader_dir.as_os_str().is_empty() {
            anyhow::bail!("graphics.shader_dir must not be empty");
        }

        if let Some(c) = self
            .graphics
            .clear_color
            .iter()
            .find(|&&c| !(0.0f32..=1.0).contains(&c))
        {
            anyhow::bail!("Clear color components must be in [0, 1], got {}", c);
        }

        Ok(())
    }

    /// Get preferred present mode as Vulkan enum
    pub fn preferred_present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to MAILBOX",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::MAILBOX
            }
        }
    }

    /// Validation layers are a debug-build feature only
    pub fn enable_validation(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.debug
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fixed_800x600_window() {
        let config = Config::default();
        assert_eq!(config.window.title, "Vulkan");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(!config.window.resizable);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::MAILBOX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1024

            [graphics]
            present_mode = "FIFO"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.graphics.shader_dir, PathBuf::from("shaders"));
        assert!(config.debug.validation_layers);
    }

    #[test]
    fn unknown_present_mode_falls_back_to_mailbox() {
        let config = Config::from_toml_str("[graphics]\npresent_mode = \"vsync\"").unwrap();
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml_str("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.window.height = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.clear_color = [0.0, 1.5, 0.0, 1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.shader_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("does/not/exist/config.toml").unwrap();
        assert_eq!(config.window.width, 800);
    }

    fn write_temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hello-triangle-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn malformed_file_error_names_the_path() {
        let path = write_temp_config("malformed", "[window]\nwidth = \"wide\"");

        let err = Config::load_from_path(&path).unwrap_err();
        let message = format!("{:#}", err);
        std::fs::remove_file(&path).unwrap();

        assert!(message.contains("Failed to parse config file"), "{}", message);
        assert!(message.contains(&*path.to_string_lossy()), "{}", message);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = write_temp_config(
            "fallback",
            "[graphics]\nclear_color = \"red\"\n[window]\nwidth = 5",
        );

        let config = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        let defaults = Config::default();
        assert_eq!(config.window.width, defaults.window.width);
        assert_eq!(config.window.title, defaults.window.title);
        assert_eq!(config.graphics.clear_color, defaults.graphics.clear_color);
        assert_eq!(config.graphics.present_mode, defaults.graphics.present_mode);
        assert_eq!(config.debug.validation_layers, defaults.debug.validation_layers);
    }

    #[test]
    fn valid_file_is_read_from_disk() {
        let path = write_temp_config("valid", "[window]\ntitle = \"Triangle\"\nresizable = true");

        let config = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.title, "Triangle");
        assert!(config.window.resizable);
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn log_level_parses_or_defaults() {
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();
        assert_eq!(config.log_level(), log::LevelFilter::Debug);

        config.debug.log_level = "chatty".to_string();
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }
}
