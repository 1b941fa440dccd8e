//! Command handlers for hybridbot.
//!
//! # Commands
//! - `session`: continuous multimodal session (default)
//! - `chat`: one text turn
//! - `auth`: login, registration and logout
//! - `history`: conversation viewer
//! - `new_session`: start a fresh backend conversation
//! - `admin`: usage statistics, users and sessions
//! - `config`: open the configuration file in an editor
//! - `list_devices`: list audio input devices
//! - `logs`: show recent log entries

pub mod admin;
pub mod auth;
pub mod chat;
pub mod config;
pub mod context;
pub mod history;
pub mod list_devices;
pub mod logs;
pub mod new_session;
pub mod session;

pub use admin::{handle_admin, AdminView};
pub use auth::{handle_login, handle_logout, handle_register};
pub use chat::handle_chat;
pub use config::handle_config;
pub use history::handle_history;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use new_session::handle_new_session;
pub use session::handle_session;
