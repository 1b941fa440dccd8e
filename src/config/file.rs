//! Configuration file management for hybridbot.
//!
//! Configuration is stored as TOML in the user's config directory and is
//! created from an embedded default by the setup module on first run.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{CaptureSettings, VideoConstraints};

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the HybridBot backend, without a trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

/// Media capture settings for live sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Input device: "default", a numeric index or a name from `hybridbot list-devices`
    pub device: String,
    /// Microphone sample rate in Hz
    pub sample_rate: u32,
    /// Milliseconds between preview frame grabs
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Frames kept between turns; older frames are dropped
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,
    /// Milliseconds between encoder chunk emissions
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
    /// Upper bound on waiting for the encoder flush before draining
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// JPEG quality for preview frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_frame_interval_ms() -> u64 {
    500
}

fn default_frame_capacity() -> usize {
    crate::capture::frames::DEFAULT_FRAME_CAPACITY
}

fn default_timeslice_ms() -> u64 {
    1000
}

fn default_flush_timeout_ms() -> u64 {
    500
}

fn default_jpeg_quality() -> u8 {
    80
}

/// Chat history behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Messages kept in the local history per user
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Remove the local history when logging out
    #[serde(default)]
    pub clear_on_logout: bool,
    /// Persist live-session messages locally
    #[serde(default = "default_true")]
    pub enable_persistence: bool,
}

fn default_max_messages() -> usize {
    crate::history::DEFAULT_MAX_MESSAGES
}

fn default_true() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            clear_on_logout: false,
            enable_persistence: true,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridbotConfig {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl HybridbotConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::parse(&config_content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    /// - If the TOML is malformed or a required field is missing
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Invalid configuration file")
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    /// Capture settings derived from the `[capture]` section.
    pub fn capture_settings(&self) -> CaptureSettings {
        let capture = &self.capture;
        CaptureSettings {
            video: VideoConstraints::default(),
            frame_interval: Duration::from_millis(capture.frame_interval_ms.max(1)),
            frame_capacity: capture.frame_capacity,
            timeslice: Duration::from_millis(capture.timeslice_ms.max(1)),
            flush_timeout: Duration::from_millis(capture.flush_timeout_ms),
            jpeg_quality: capture.jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for HybridbotConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://localhost:5000".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            capture: CaptureConfig {
                device: "default".to_string(),
                sample_rate: 16000,
                frame_interval_ms: default_frame_interval_ms(),
                frame_capacity: default_frame_capacity(),
                timeslice_ms: default_timeslice_ms(),
                flush_timeout_ms: default_flush_timeout_ms(),
                jpeg_quality: default_jpeg_quality(),
            },
            chat: ChatConfig::default(),
        }
    }
}

/// Returns the path of the config file, creating its directory.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .context("Could not find home directory")?
        .join(".config")
        .join("hybridbot");
    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("hybridbot.toml"))
}

/// Returns the directory holding credentials and the history database.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".local")
        .join("share")
        .join("hybridbot"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_parses() {
        let content = include_str!("../../environments/hybridbot.toml");
        let config = HybridbotConfig::parse(content).unwrap();
        assert_eq!(config.capture.frame_capacity, 20);
        assert_eq!(config.chat.max_messages, 100);
        assert!(config.chat.enable_persistence);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let config = HybridbotConfig::parse(
            r#"
config_version = "0.1.0"

[server]
base_url = "http://example.test"

[capture]
device = "default"
sample_rate = 48000
"#,
        )
        .unwrap();

        assert_eq!(config.server.timeout_secs, 60);
        assert_eq!(config.capture.timeslice_ms, 1000);
        assert!(!config.chat.clear_on_logout);
    }

    #[test]
    fn test_capture_settings_clamp_quality() {
        let mut config = HybridbotConfig::default();
        config.capture.jpeg_quality = 0;
        config.capture.flush_timeout_ms = 250;

        let settings = config.capture_settings();
        assert_eq!(settings.jpeg_quality, 1);
        assert_eq!(settings.flush_timeout, Duration::from_millis(250));
        assert_eq!(settings.frame_capacity, 20);
    }
}
