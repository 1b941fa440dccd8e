//! Admin dashboard: usage statistics, users and sessions.

use clap::Subcommand;
use console::{pad_str, style, Alignment};

use crate::api::{AdminSession, AdminStats, AdminUser, BackendError};
use crate::commands::context::CommandContext;

const BAR_WIDTH: usize = 40;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum AdminView {
    /// Totals and daily message activity
    Stats,
    /// Registered users
    Users,
    /// Recent sessions with their summaries
    Sessions,
}

/// Fetches and prints one admin view.
///
/// # Errors
/// - If nobody is logged in or the account is not an admin
/// - If the backend cannot be reached
pub async fn handle_admin(view: AdminView) -> anyhow::Result<()> {
    let mut ctx = CommandContext::load()?;
    ctx.require_login()?;
    if !ctx.credentials.is_admin() {
        anyhow::bail!(BackendError::Forbidden.user_message());
    }
    let client = ctx.client()?;

    let result = match view {
        AdminView::Stats => client.admin_stats().await.map(|s| print_stats(&s)),
        AdminView::Users => client.admin_users().await.map(|u| print_users(&u)),
        AdminView::Sessions => client.admin_sessions().await.map(|s| print_sessions(&s)),
    };

    match result {
        Ok(()) => Ok(()),
        Err(BackendError::Unauthorized(msg)) => {
            ctx.expire_login();
            anyhow::bail!("{msg} Run 'hybridbot login' again.")
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

fn print_stats(stats: &AdminStats) {
    println!("{}", style("Overview").bold());
    println!("  Users            {}", stats.total_users);
    println!("  Sessions         {}", stats.total_sessions);
    if let Some(messages) = stats.total_messages {
        println!("  Messages         {messages}");
    }
    if let Some(avg) = stats.avg_sessions_per_user {
        println!("  Sessions / user  {avg:.1}");
    }
    if !stats.active_models.is_empty() {
        println!("  Active models    {}", stats.active_models.join(", "));
    }

    let activity = &stats.daily_activity;
    if activity.labels.is_empty() {
        return;
    }
    println!();
    println!("{}", style("Daily activity").bold());
    let max = activity.values.iter().copied().max().unwrap_or(0).max(1);
    for (label, value) in activity.labels.iter().zip(&activity.values) {
        let bar = "█".repeat(activity_bar_len(*value, max));
        println!("  {}  {} {}", pad_str(label, 10, Alignment::Left, None), style(bar).cyan(), value);
    }
}

fn activity_bar_len(value: u64, max: u64) -> usize {
    ((value as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
}

fn print_users(users: &[AdminUser]) {
    if users.is_empty() {
        println!("No users.");
        return;
    }
    println!(
        "{}",
        style(format!("{:>5}  {:<20} {:<8} {:>8}  {}", "ID", "USERNAME", "ROLE", "SESSIONS", "JOINED")).dim()
    );
    for user in users {
        let role = if user.role.eq_ignore_ascii_case("admin") {
            style(format!("{:<8}", user.role)).yellow()
        } else {
            style(format!("{:<8}", user.role))
        };
        println!(
            "{:>5}  {:<20} {} {:>8}  {}",
            user.id,
            pad_str(&user.username, 20, Alignment::Left, Some("…")),
            role,
            user.sessions,
            user.joined
        );
    }
}

fn print_sessions(sessions: &[AdminSession]) {
    if sessions.is_empty() {
        println!("No sessions.");
        return;
    }
    for session in sessions {
        println!(
            "{} {}  {}  {} messages",
            style(format!("#{}", session.id)).bold(),
            session.user,
            style(&session.start).dim(),
            session.messages
        );
        if !session.summary.is_empty() {
            println!("    {}", session.summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_bar_scales_to_max() {
        assert_eq!(activity_bar_len(10, 10), BAR_WIDTH);
        assert_eq!(activity_bar_len(5, 10), BAR_WIDTH / 2);
        assert_eq!(activity_bar_len(0, 1), 0);
    }
}
