//! Config file version checks.
//!
//! The first line of the config file records the version that wrote it.

use anyhow::anyhow;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `major.minor.patch`; fields compare in declaration order.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SemanticVersion {
    fn parse(version_str: &str) -> anyhow::Result<Self> {
        let invalid = || anyhow!("Invalid version '{version_str}'. Expected 'major.minor.patch'");
        let mut parts = version_str.trim().split('.').map(|p| p.parse::<u32>());

        let (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(SemanticVersion {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version recorded on the first line as `config_version = "X.Y.Z"`.
///
/// A commented-out or missing version line yields `None`.
fn read_config_version_from_file(config_path: &Path) -> anyhow::Result<Option<String>> {
    let content = std::fs::read_to_string(config_path)?;
    let first_line = content.lines().next().unwrap_or_default();

    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex
        .captures(first_line)
        .map(|caps| caps[1].to_string()))
}

/// Returns the config file's version when it is older than this binary.
///
/// Files without a version line count as outdated. A missing file, a current
/// file or a file from a newer binary need nothing.
///
/// # Errors
/// - If the file cannot be read or holds an unparseable version
pub fn check_setup_needed(config_path: &Path) -> anyhow::Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let Some(config_version) = read_config_version_from_file(config_path)? else {
        return Ok(Some("unknown (unversioned config)".to_string()));
    };

    let current = SemanticVersion::parse(CURRENT_VERSION)?;
    match SemanticVersion::parse(&config_version)?.cmp(&current) {
        Ordering::Less => Ok(Some(config_version)),
        Ordering::Equal => Ok(None),
        Ordering::Greater => {
            tracing::warn!(
                "Config version {} is newer than app version {}",
                config_version,
                current
            );
            Ok(None)
        }
    }
}

/// Rewrites the file with this binary's version as its first line, keeping
/// every other line.
///
/// # Errors
/// - If the file cannot be read or written
pub fn update_config_version(config_path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(config_path)?;
    let mut lines = vec![format!("config_version = \"{CURRENT_VERSION}\"")];
    lines.extend(
        content
            .lines()
            .filter(|line| !line.trim_start().starts_with("config_version"))
            .map(str::to_string),
    );
    std::fs::write(config_path, lines.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_version_parse() {
        let v = SemanticVersion::parse("0.0.5").unwrap();
        assert_eq!(v.major, 0);
        assert_eq!(v.minor, 0);
        assert_eq!(v.patch, 5);
    }

    #[test]
    fn test_semantic_version_comparison() {
        let v1 = SemanticVersion::parse("0.0.4").unwrap();
        let v2 = SemanticVersion::parse("0.0.5").unwrap();
        let v3 = SemanticVersion::parse("0.1.0").unwrap();

        assert!(v1 < v2);
        assert!(v2 < v3);
        assert_eq!(v1, v1.clone());
    }

    #[test]
    fn test_check_setup_needed_reads_first_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hybridbot.toml");

        std::fs::write(&path, "config_version = \"0.0.0\"\n[server]\n").unwrap();
        assert_eq!(check_setup_needed(&path).unwrap().as_deref(), Some("0.0.0"));

        std::fs::write(&path, "# config_version = \"0.0.0\"\n").unwrap();
        assert!(check_setup_needed(&path).unwrap().is_some());

        update_config_version(&path).unwrap();
        assert_eq!(check_setup_needed(&path).unwrap(), None);
    }

    #[test]
    fn test_invalid_version_format() {
        assert!(SemanticVersion::parse("0.0").is_err());
        assert!(SemanticVersion::parse("0.0.5.1").is_err());
        assert!(SemanticVersion::parse("invalid").is_err());
    }
}
