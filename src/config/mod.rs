//! Configuration management for hybridbot.
//!
//! Settings are loaded from a TOML file in the user's config directory. Login
//! state is kept separately, with restricted permissions, in the user's local
//! data directory.

pub mod credentials;
pub mod file;

pub use credentials::{credentials_dir, token_subject, Credentials, Role};
pub use file::{get_config_path, get_data_dir, CaptureConfig, ChatConfig, HybridbotConfig, ServerConfig};
