//! First-run setup and config upgrades.
//!
//! Writes the embedded default configuration when no config file exists, and
//! re-stamps `config_version` when the binary is newer than the file.

pub mod version;

use std::path::Path;

use crate::config::get_config_path;

/// Embedded default configuration template.
const DEFAULT_CONFIG: &str = include_str!("../../environments/hybridbot.toml");

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates or upgrades the config file if needed.
///
/// # Errors
/// - If the config path cannot be determined
/// - If the file cannot be read or written
pub fn check_and_run_setup() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    ensure_config(&config_path)
}

/// Writes the default config at `config_path` if it is missing, otherwise
/// updates its version line when it is older than this binary.
///
/// Existing settings are never overwritten.
///
/// # Errors
/// - If the file cannot be read or written
pub fn ensure_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        tracing::info!("No config found; writing defaults to {}", config_path.display());
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let full_config = format!(
            "config_version = \"{CURRENT_VERSION}\"\n{DEFAULT_CONFIG}"
        );
        std::fs::write(config_path, full_config)?;
        return Ok(());
    }

    match version::check_setup_needed(config_path)? {
        Some(old_version) => {
            tracing::info!(
                "Upgrading config from version {} to {}",
                old_version,
                CURRENT_VERSION
            );
            version::update_config_version(config_path)?;
        }
        None => tracing::debug!("Config version up to date ({})", CURRENT_VERSION),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HybridbotConfig;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_versioned_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("hybridbot.toml");

        ensure_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&format!("config_version = \"{CURRENT_VERSION}\"")));
        assert!(HybridbotConfig::parse(&content).is_ok());
    }

    #[test]
    fn test_upgrade_keeps_user_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hybridbot.toml");
        std::fs::write(
            &path,
            "config_version = \"0.0.1\"\n[server]\nbase_url = \"http://custom\"\n\n[capture]\ndevice = \"1\"\nsample_rate = 44100\n",
        )
        .unwrap();

        ensure_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&format!("config_version = \"{CURRENT_VERSION}\"")));
        let config = HybridbotConfig::parse(&content).unwrap();
        assert_eq!(config.server.base_url, "http://custom");
        assert_eq!(config.capture.sample_rate, 44100);
    }
}
