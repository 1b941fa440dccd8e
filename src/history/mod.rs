//! Chat history: local cache, persistence of live turns and the viewer.
//!
//! The server is the source of truth. The local store is refreshed whenever
//! the server answers and read back when it does not.

pub mod storage;
pub mod ui;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{BackendClient, HistoryMessage};
use crate::emotion::EmotionTracker;
use crate::session::{ChatMessage, MessageKind, SessionObserver};

pub use storage::{ChatHistoryStore, ChatRecord, DEFAULT_MAX_MESSAGES};
pub use ui::ConversationViewer;

/// Where a loaded conversation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    Server,
    Local,
    Empty,
}

/// Loads `username`'s conversation, preferring the server.
///
/// A successful server response also refreshes the local cache; a failed one
/// falls back to whatever was cached.
pub async fn load_history(
    client: &BackendClient,
    store: &mut ChatHistoryStore,
    username: &str,
) -> (Vec<HistoryMessage>, HistorySource) {
    match client.chat_history().await {
        Ok(messages) if !messages.is_empty() => {
            tracing::info!("Loaded {} messages from server", messages.len());
            if let Err(e) = store.save(username, messages.clone()) {
                tracing::warn!("Failed to cache chat history: {}", e);
            }
            return (messages, HistorySource::Server);
        }
        Ok(_) => tracing::info!("Server has no chat history for {}", username),
        Err(e) => tracing::warn!("Failed to load chat history from server: {}", e),
    }

    match store.load(username) {
        Ok(Some(record)) if !record.messages.is_empty() => {
            tracing::info!(
                "Loaded {} messages from local cache (last updated {})",
                record.messages.len(),
                record.last_updated
            );
            (record.messages, HistorySource::Local)
        }
        Ok(_) => (Vec::new(), HistorySource::Empty),
        Err(e) => {
            tracing::warn!("Failed to read local chat history: {}", e);
            (Vec::new(), HistorySource::Empty)
        }
    }
}

/// Rebuilds the emotional timeline from stored bot replies.
pub fn tracker_from_history(messages: &[HistoryMessage], now: DateTime<Local>) -> EmotionTracker {
    let mut tracker = EmotionTracker::new();
    tracker.hydrate(
        messages
            .iter()
            .filter(|m| m.sender != "You")
            .map(|m| {
                let timestamp = m
                    .timestamp
                    .as_deref()
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|ts| ts.with_timezone(&Local));
                (m.state.clone(), m.risk_level, timestamp)
            }),
        now,
    );
    tracker
}

/// Appends what was said during a live session to the local cache.
///
/// Only user turns and bot replies are kept; notices and placeholders are
/// display-only. SQLite writes happen on a writer task, so observer
/// callbacks only enqueue.
pub struct HistoryObserver {
    tx: mpsc::UnboundedSender<HistoryMessage>,
}

impl HistoryObserver {
    /// Starts the writer task for `username`.
    ///
    /// The returned handle completes once the observer is dropped and every
    /// queued message has been written.
    pub fn spawn(store: ChatHistoryStore, username: &str) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_history(store, username.to_string(), rx));
        (Self { tx }, writer)
    }
}

async fn write_history(
    mut store: ChatHistoryStore,
    username: String,
    mut rx: mpsc::UnboundedReceiver<HistoryMessage>,
) {
    while let Some(entry) = rx.recv().await {
        let name = username.clone();
        let written = tokio::task::spawn_blocking(move || {
            let result = store.append(&name, entry);
            (store, result)
        })
        .await;

        match written {
            Ok((returned, result)) => {
                store = returned;
                if let Err(e) = result {
                    tracing::warn!("Failed to persist chat message: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("History writer stopped: {}", e);
                return;
            }
        }
    }
    tracing::debug!("History writer finished");
}

impl SessionObserver for HistoryObserver {
    fn chat(&self, message: ChatMessage) {
        if !matches!(message.kind, MessageKind::User | MessageKind::Bot) {
            return;
        }

        let entry = HistoryMessage {
            text: message.text,
            sender: message.sender,
            timestamp: Some(Local::now().to_rfc3339()),
            state: message.state,
            risk_level: message.risk,
        };

        if self.tx.send(entry).is_err() {
            tracing::warn!("History writer gone; message not persisted");
        }
    }
}
