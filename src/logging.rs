//! File logging for hybridbot.
//!
//! Logs go to a daily-rotated file under the XDG state directory and never to
//! the terminal, which belongs to the TUI. Only the newest week of files is
//! kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

pub const LOG_FILE_PREFIX: &str = "hybridbot.log";
const MAX_LOG_FILES: usize = 7;

static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global subscriber writing to the rolling log file.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = get_log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir, MAX_LOG_FILES) {
        eprintln!("Warning: Failed to clean up old logs: {e}");
    }

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .try_init()?;

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(())
}

/// `$XDG_STATE_HOME/hybridbot`, or `~/.local/state/hybridbot`.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn get_log_dir() -> anyhow::Result<PathBuf> {
    let log_dir = match std::env::var_os("XDG_STATE_HOME") {
        Some(state_home) => PathBuf::from(state_home).join("hybridbot"),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local/state/hybridbot"),
    };
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Rotated log files in `log_dir`, newest first.
///
/// # Errors
/// - If the directory cannot be read
pub fn rotated_log_files(log_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let prefix = format!("{LOG_FILE_PREFIX}.");
    let mut files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_string_lossy().into_owned();
            // hybridbot.log.YYYY-MM-DD
            if name.starts_with(&prefix) && name.matches('-').count() == 2 {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

fn cleanup_old_logs(log_dir: &Path, keep: usize) -> anyhow::Result<()> {
    for path in rotated_log_files(log_dir)?.iter().skip(keep) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_keeps_newest_files_and_ignores_others() {
        let dir = TempDir::new().unwrap();
        for day in 1..=9 {
            fs::write(dir.path().join(format!("hybridbot.log.2025-01-0{day}")), "x").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        cleanup_old_logs(dir.path(), 7).unwrap();

        let remaining = rotated_log_files(dir.path()).unwrap();
        assert_eq!(remaining.len(), 7);
        assert!(dir.path().join("notes.txt").exists());
    }
}
