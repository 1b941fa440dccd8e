//! Everything a command needs from disk: config, login state and clients.

use std::path::PathBuf;

use crate::api::BackendClient;
use crate::config::{credentials_dir, get_data_dir, Credentials, HybridbotConfig};
use crate::history::ChatHistoryStore;

pub struct CommandContext {
    pub config: HybridbotConfig,
    pub credentials: Credentials,
    pub credentials_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl CommandContext {
    /// Loads the config file and the stored credentials.
    ///
    /// # Errors
    /// - If the config file is missing or malformed
    /// - If the credentials file cannot be parsed
    pub fn load() -> anyhow::Result<Self> {
        let config = HybridbotConfig::load()?;
        let credentials_dir = credentials_dir()?;
        let credentials = Credentials::load_from(&credentials_dir)?;
        Ok(Self {
            config,
            credentials,
            credentials_dir,
            data_dir: get_data_dir()?,
        })
    }

    /// Client authenticated with the stored token, if any.
    ///
    /// # Errors
    /// - If the HTTP client cannot be built
    pub fn client(&self) -> anyhow::Result<BackendClient> {
        Ok(
            BackendClient::new(&self.config.server.base_url, self.config.request_timeout())?
                .with_token(self.credentials.access_token.clone()),
        )
    }

    pub fn history_store(&self) -> ChatHistoryStore {
        ChatHistoryStore::new(&self.data_dir, self.config.chat.max_messages)
    }

    /// Username of the logged-in user.
    ///
    /// # Errors
    /// - If nobody is logged in
    pub fn require_login(&self) -> anyhow::Result<String> {
        if !self.credentials.is_logged_in() {
            anyhow::bail!("Not logged in. Run 'hybridbot login' first.");
        }
        self.credentials
            .username()
            .ok_or_else(|| anyhow::anyhow!("Stored token is invalid. Run 'hybridbot login' again."))
    }

    pub fn save_credentials(&self) -> anyhow::Result<()> {
        self.credentials.save_to(&self.credentials_dir)
    }

    /// Forgets the login after the server rejected the token.
    pub fn expire_login(&mut self) {
        tracing::warn!("Token rejected by server; clearing stored login");
        self.credentials.logout();
        if let Err(e) = self.save_credentials() {
            tracing::error!("Failed to clear credentials: {}", e);
        }
    }
}
