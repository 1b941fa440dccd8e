//! One text turn against `/api/chat`.

use chrono::Local;
use console::style;

use crate::api::{BackendError, HistoryMessage};
use crate::commands::context::CommandContext;
use crate::emotion::RiskLevel;

/// Sends `message` in the stored backend session and prints the reply.
///
/// # Errors
/// - If nobody is logged in
/// - If the backend rejects the message or cannot be reached
pub async fn handle_chat(message: &str) -> anyhow::Result<()> {
    let mut ctx = CommandContext::load()?;
    let username = ctx.require_login()?;
    let message = message.trim();
    if message.is_empty() {
        anyhow::bail!("Message is empty");
    }

    let client = ctx.client()?;
    let session_id = ctx.credentials.current_session_id.clone();
    let reply = match client.chat(message, session_id.as_deref()).await {
        Ok(reply) => reply,
        Err(BackendError::Unauthorized(msg)) => {
            ctx.expire_login();
            anyhow::bail!("{msg} Run 'hybridbot login' again.");
        }
        Err(e) => anyhow::bail!(e.user_message()),
    };

    println!("{} {}", style("HybridBot:").cyan().bold(), reply.response);
    if let Some(state) = &reply.state {
        let risk = reply.risk_level.unwrap_or_default();
        let risk_label = match risk {
            RiskLevel::High => style(risk.to_string()).red(),
            RiskLevel::Medium => style(risk.to_string()).yellow(),
            RiskLevel::Low => style(risk.to_string()).green(),
        };
        println!("{} {} / {}", style("state:").dim(), state, risk_label);
    }

    if ctx.config.chat.enable_persistence {
        let now = Local::now().to_rfc3339();
        let mut store = ctx.history_store();
        let entries = [
            HistoryMessage {
                text: message.to_string(),
                sender: "You".to_string(),
                timestamp: Some(now.clone()),
                state: None,
                risk_level: None,
            },
            HistoryMessage {
                text: reply.response,
                sender: "HybridBot".to_string(),
                timestamp: Some(now),
                state: reply.state,
                risk_level: reply.risk_level,
            },
        ];
        for entry in entries {
            if let Err(e) = store.append(&username, entry) {
                tracing::warn!("Failed to persist chat message: {}", e);
                break;
            }
        }
    }

    Ok(())
}
