//! Stored login state.
//!
//! The access token, the user's role and the id of the last backend session
//! live in `credentials.toml` next to the history database. The file is only
//! readable by its owner.

use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "credentials.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "Admin"),
            Self::User => write!(f, "User"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_id: Option<String>,
}

impl Credentials {
    /// Reads credentials from `dir`; a missing file means logged out.
    ///
    /// # Errors
    /// - If the file exists but cannot be read or parsed
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(CREDENTIALS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Invalid credentials file")
    }

    /// Writes credentials to `dir` with owner-only permissions.
    ///
    /// # Errors
    /// - If the directory cannot be created or the file written
    pub fn save_to(&self, dir: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CREDENTIALS_FILE);
        fs::write(&path, toml::to_string_pretty(self)?)?;

        #[cfg(unix)]
        restrict_permissions(&path)?;

        tracing::debug!("Credentials saved to {}", path.display());
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Stores a fresh login.
    pub fn login(&mut self, token: String, is_admin: bool) {
        self.access_token = Some(token);
        self.role = if is_admin { Role::Admin } else { Role::User };
    }

    /// Forgets the token, the role and the backend session.
    pub fn logout(&mut self) {
        *self = Self::default();
    }

    /// Username carried by the stored token, if any.
    pub fn username(&self) -> Option<String> {
        self.access_token.as_deref().and_then(token_subject)
    }
}

/// Directory holding the credentials file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn credentials_dir() -> anyhow::Result<PathBuf> {
    super::file::get_data_dir()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

/// Extracts the user identity from a JWT without verifying it.
///
/// Looks at `sub`, then `username`, then `identity` in the payload.
pub fn token_subject(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| tracing::debug!("Token payload is not base64: {}", e))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    ["sub", "username", "identity"].iter().find_map(|claim| {
        match claims.get(claim)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}
