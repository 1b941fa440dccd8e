//! Conversation history viewer.

use chrono::Local;

use crate::commands::context::CommandContext;
use crate::history::{load_history, tracker_from_history, ConversationViewer, HistorySource};

/// Loads the conversation (server first, local cache second) and shows it.
///
/// # Errors
/// - If nobody is logged in
/// - If the viewer cannot drive the terminal
pub async fn handle_history() -> anyhow::Result<()> {
    tracing::info!("=== hybridbot history viewer ===");

    let ctx = CommandContext::load()?;
    let username = ctx.require_login()?;
    let client = ctx.client()?;
    let mut store = ctx.history_store();

    let (messages, source) = load_history(&client, &mut store, &username).await;
    match source {
        HistorySource::Empty => {
            println!("No chat history found.");
            return Ok(());
        }
        HistorySource::Local => {
            tracing::info!("Showing cached history; server unavailable");
        }
        HistorySource::Server => {}
    }

    let tracker = tracker_from_history(&messages, Local::now());
    let mut viewer = ConversationViewer::new(messages, &tracker)?;
    viewer.run()?;

    tracing::debug!("History viewer closed");
    Ok(())
}
