//! Login, registration and logout.

use cliclack::{input, intro, note, outro, outro_cancel, password, spinner};
use console::style;

use crate::commands::context::CommandContext;

fn install_ctrlc_handler() -> anyhow::Result<()> {
    // cliclack restores the terminal itself when a prompt is interrupted.
    ctrlc::set_handler(|| {}).map_err(|e| anyhow::anyhow!("Failed to set Ctrl-C handler: {e}"))
}

fn prompt_credentials() -> anyhow::Result<(String, String)> {
    let username: String = input("Username")
        .validate(|value: &String| {
            if value.trim().is_empty() {
                Err("Username is required")
            } else {
                Ok(())
            }
        })
        .interact()?;
    let password = password("Password").mask('▪').interact()?;
    Ok((username.trim().to_string(), password))
}

/// Logs in and stores the returned token.
///
/// # Errors
/// - If the prompts are cancelled or the config cannot be loaded
pub async fn handle_login() -> anyhow::Result<()> {
    tracing::info!("=== hybridbot login ===");
    install_ctrlc_handler()?;
    let mut ctx = CommandContext::load()?;

    intro(style(" login ").on_white().black())?;
    if let Some(current) = ctx.credentials.username() {
        note("currently logged in as", &current)?;
    }

    let (username, password) = prompt_credentials()?;
    let client = ctx.client()?.with_token(None);

    let progress = spinner();
    progress.start("Signing in...");
    match client.login(&username, &password).await {
        Ok(login) => {
            progress.stop("Signed in");
            ctx.credentials.login(login.access_token, login.is_admin);
            ctx.save_credentials()?;
            let role = ctx.credentials.role;
            tracing::info!("Logged in as {} ({})", username, role);
            outro(format!("Welcome, {username}! Role: {role}"))?;
        }
        Err(e) => {
            progress.stop("Sign in failed");
            tracing::warn!("Login failed for {}: {}", username, e);
            outro_cancel(e.user_message())?;
        }
    }
    Ok(())
}

/// Creates an account; the user logs in separately afterwards.
///
/// # Errors
/// - If the prompts are cancelled or the config cannot be loaded
pub async fn handle_register() -> anyhow::Result<()> {
    tracing::info!("=== hybridbot register ===");
    install_ctrlc_handler()?;
    let ctx = CommandContext::load()?;

    intro(style(" register ").on_white().black())?;
    let (username, password) = prompt_credentials()?;
    let confirm = cliclack::password("Confirm password").mask('▪').interact()?;
    if confirm != password {
        outro_cancel("Passwords do not match")?;
        return Ok(());
    }

    match ctx.client()?.with_token(None).register(&username, &password).await {
        Ok(message) => {
            tracing::info!("Registered {}", username);
            outro(format!("{message}. Run 'hybridbot login' to sign in."))?;
        }
        Err(e) => {
            tracing::warn!("Registration failed for {}: {}", username, e);
            outro_cancel(e.user_message())?;
        }
    }
    Ok(())
}

/// Forgets the stored login, clearing local history if configured to.
///
/// # Errors
/// - If the config or credentials cannot be read or written
pub fn handle_logout() -> anyhow::Result<()> {
    let mut ctx = CommandContext::load()?;

    let Some(username) = ctx.credentials.username() else {
        println!("Not logged in.");
        return Ok(());
    };

    if ctx.config.chat.clear_on_logout {
        ctx.history_store().clear(&username)?;
    }

    ctx.credentials.logout();
    ctx.save_credentials()?;
    tracing::info!("Logged out {}", username);
    println!("{} {}", style("Logged out").green(), username);
    Ok(())
}
