//! Starts a fresh backend conversation.

use console::style;

use crate::api::SessionBackend;
use crate::commands::context::CommandContext;

/// Ends the stored backend session, registers a new one and clears the local
/// history.
///
/// # Errors
/// - If nobody is logged in
/// - If the new session cannot be registered
pub async fn handle_new_session() -> anyhow::Result<()> {
    let mut ctx = CommandContext::load()?;
    let username = ctx.require_login()?;
    let client = ctx.client()?;

    if let Some(previous) = ctx.credentials.current_session_id.take() {
        match client.end_session(&previous).await {
            Ok(ack) => {
                if let Some(summary) = ack.summary.filter(|s| !s.is_empty()) {
                    println!("{}\n{}\n", style("Previous session summary:").dim(), summary);
                }
            }
            Err(e) => tracing::warn!("Failed to end session {}: {}", previous, e),
        }
    }

    let session_id = client
        .start_session()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    ctx.credentials.current_session_id = Some(session_id.clone());
    ctx.save_credentials()?;

    ctx.history_store().clear(&username)?;

    tracing::info!("New session {} for {}", session_id, username);
    println!("{} {}", style("New session started:").green(), session_id);
    Ok(())
}
