//! Per-user chat history cache backed by SQLite.
//!
//! Each user's conversation is stored as one JSON record under the key
//! `chat_history_<username>` in a small key/value table, so the record shape
//! matches what the backend serves from `/api/chat_history`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::HistoryMessage;

/// Messages kept per user when no limit is configured.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// One user's cached conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub messages: Vec<HistoryMessage>,
    pub username: String,
    pub last_updated: DateTime<Utc>,
}

/// Manages the chat history database.
pub struct ChatHistoryStore {
    database_path: PathBuf,
    connection: Option<Connection>,
    max_messages: usize,
}

impl ChatHistoryStore {
    /// Creates a store whose database lives in `data_dir`.
    ///
    /// The database file is opened lazily on first use.
    pub fn new(data_dir: &Path, max_messages: usize) -> Self {
        Self {
            database_path: data_dir.join("chat_history.db"),
            connection: None,
            max_messages: max_messages.max(1),
        }
    }

    fn key(username: &str) -> String {
        format!("chat_history_{username}")
    }

    /// Opens the connection and creates the table if necessary.
    ///
    /// # Errors
    /// - If the database file cannot be opened
    /// - If table creation fails
    fn get_connection(&mut self) -> Result<&Connection> {
        if self.connection.is_none() {
            if let Some(parent) = self.database_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
            let connection = Connection::open(&self.database_path)?;
            connection.execute(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )?;
            self.connection = Some(connection);
        }

        self.connection
            .as_ref()
            .context("Chat history database is not open")
    }

    /// Loads the cached record for `username`, if any.
    ///
    /// # Errors
    /// - If the database cannot be read
    /// - If the stored value is not a valid record
    pub fn load(&mut self, username: &str) -> Result<Option<ChatRecord>> {
        let key = Self::key(username);
        let connection = self.get_connection()?;

        let value = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        value
            .map(|json| {
                serde_json::from_str::<ChatRecord>(&json)
                    .with_context(|| format!("Corrupt chat history record for {username}"))
            })
            .transpose()
    }

    /// Replaces the cached conversation, keeping only the newest messages.
    ///
    /// # Errors
    /// - If the database cannot be written
    pub fn save(&mut self, username: &str, mut messages: Vec<HistoryMessage>) -> Result<()> {
        if messages.len() > self.max_messages {
            let excess = messages.len() - self.max_messages;
            messages.drain(..excess);
        }

        let record = ChatRecord {
            messages,
            username: username.to_string(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string(&record)?;
        let key = Self::key(username);
        let updated_at = record.last_updated.to_rfc3339();

        self.get_connection()?.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, updated_at],
        )?;

        tracing::debug!(
            "Saved {} chat messages for {}",
            record.messages.len(),
            username
        );
        Ok(())
    }

    /// Appends one message to the cached conversation.
    ///
    /// # Errors
    /// - If the database cannot be read or written
    pub fn append(&mut self, username: &str, message: HistoryMessage) -> Result<()> {
        let mut messages = self
            .load(username)?
            .map(|record| record.messages)
            .unwrap_or_default();
        messages.push(message);
        self.save(username, messages)
    }

    /// Removes the cached conversation for `username`.
    ///
    /// # Errors
    /// - If the database cannot be written
    pub fn clear(&mut self, username: &str) -> Result<()> {
        let key = Self::key(username);
        self.get_connection()?
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        tracing::info!("Cleared local chat history for {}", username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(text: &str, sender: &str) -> HistoryMessage {
        HistoryMessage {
            text: text.to_string(),
            sender: sender.to_string(),
            timestamp: None,
            state: None,
            risk_level: None,
        }
    }

    #[test]
    fn test_load_missing_user_returns_none() {
        let dir = TempDir::new().unwrap();
        let mut store = ChatHistoryStore::new(dir.path(), DEFAULT_MAX_MESSAGES);
        assert!(store.load("nobody").unwrap().is_none());
    }

    #[test]
    fn test_append_keeps_newest_messages() {
        let dir = TempDir::new().unwrap();
        let mut store = ChatHistoryStore::new(dir.path(), 3);

        for i in 0..5 {
            store.append("alice", message(&format!("m{i}"), "You")).unwrap();
        }

        let record = store.load("alice").unwrap().unwrap();
        let texts: Vec<_> = record.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
        assert_eq!(record.username, "alice");
    }

    #[test]
    fn test_users_are_isolated_and_clear_removes_one() {
        let dir = TempDir::new().unwrap();
        let mut store = ChatHistoryStore::new(dir.path(), DEFAULT_MAX_MESSAGES);
        store.append("alice", message("hi", "You")).unwrap();
        store.append("bob", message("hello", "You")).unwrap();

        store.clear("alice").unwrap();

        assert!(store.load("alice").unwrap().is_none());
        assert_eq!(store.load("bob").unwrap().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_record_uses_camel_case_fields() {
        let record = ChatRecord {
            messages: vec![message("hi", "HybridBot")],
            username: "alice".to_string(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("lastUpdated").is_some());
        assert_eq!(json["messages"][0]["sender"], "HybridBot");
    }
}
