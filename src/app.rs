//! Command-line parsing and routing.

use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use crate::commands::{self, AdminView};
use crate::{logging, setup};

/// Terminal client for the HybridBot mental-health assistant
#[derive(Parser)]
#[command(name = "hybridbot")]
#[command(version)]
#[command(
    long_about = "Terminal client for the HybridBot mental-health assistant.\n\nDEFAULT COMMAND:\n    If no command is specified, 'session' is used: a continuous voice session\n    where Enter sends what you said since the last turn and q/Esc ends it.\n\nEXAMPLES:\n    $ hybridbot login\n    $ hybridbot\n    $ hybridbot chat \"I had a rough day\"\n    $ hybridbot history\n    $ kill -USR1 $(pgrep hybridbot)   # send a turn from a hotkey"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/hybridbot/hybridbot.toml\n    Credentials:        ~/.local/share/hybridbot/credentials.toml\n    Logs:               ~/.local/state/hybridbot/hybridbot.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuous voice session (default)
    ///
    /// Press Enter to send a turn, Escape/q to end the session.
    /// SIGUSR1 sends a turn as well.
    #[command(visible_alias = "s")]
    Session,

    /// Send a text message
    Chat {
        /// Message to send
        #[arg(value_name = "MESSAGE", required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Log in to the HybridBot server
    Login,

    /// Create an account
    Register,

    /// Forget the stored login
    Logout,

    /// Browse the conversation history
    #[command(visible_alias = "h")]
    History,

    /// End the current backend conversation and start a new one
    #[command(name = "new-session")]
    NewSession,

    /// Admin dashboard
    Admin {
        #[command(subcommand)]
        view: AdminView,
    },

    /// Open the configuration file in your preferred editor
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries
    Logs,

    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parses arguments and runs the selected command.
///
/// # Errors
/// - If logging or setup fails
/// - If the command fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that need neither logging nor a config file.
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "hybridbot", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;
    setup::check_and_run_setup().inspect_err(|e| tracing::error!("Setup failed: {e:#}"))?;

    let result = match cli.command {
        None | Some(Commands::Session) => commands::handle_session().await,
        Some(Commands::Chat { message }) => commands::handle_chat(&message.join(" ")).await,
        Some(Commands::Login) => commands::handle_login().await,
        Some(Commands::Register) => commands::handle_register().await,
        Some(Commands::Logout) => commands::handle_logout(),
        Some(Commands::History) => commands::handle_history().await,
        Some(Commands::NewSession) => commands::handle_new_session().await,
        Some(Commands::Admin { view }) => commands::handle_admin(view).await,
        Some(Commands::Config) => commands::handle_config(),
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("handled before logging is initialized")
        }
    };

    if let Err(e) = &result {
        if is_prompt_cancelled(e) {
            // cliclack already printed its cancellation notice.
            process::exit(0);
        }
        tracing::error!("Command failed: {e:#}");
    }
    result
}

fn exit_on_error(result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
    Ok(())
}

fn is_prompt_cancelled(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::Interrupted)
}
