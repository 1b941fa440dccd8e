//! Continuous multimodal session.
//!
//! Runs the live session TUI: Enter (or SIGUSR1 from an external trigger)
//! sends what was said since the last turn, `q`/Esc ends the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::SessionBackend;
use crate::capture::{MediaCapture, NativeEncoderFactory, NativeMediaDevices};
use crate::commands::context::CommandContext;
use crate::history::HistoryObserver;
use crate::session::ui::{LiveView, SessionCommand, SessionTui};
use crate::session::{Fanout, SessionController, SessionState, StopOutcome};
use crate::ui::{show_alert, AlertKind};

const HISTORY_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs one live session from start to teardown.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the terminal cannot be driven
pub async fn handle_session() -> anyhow::Result<()> {
    tracing::info!("=== hybridbot live session ===");

    let mut ctx = match CommandContext::load() {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err:#}");
            show_alert(
                AlertKind::Error,
                "Configuration Error",
                &format!("{err:#}\n\nCheck ~/.config/hybridbot/hybridbot.toml and try again."),
            )?;
            return Err(err);
        }
    };

    let username = ctx.credentials.username();
    if username.is_none() {
        tracing::info!("No login stored; session runs anonymously without local history");
    }

    let capture_config = &ctx.config.capture;
    tracing::info!(
        "Capture: device={}, sample_rate={}Hz, timeslice={}ms",
        capture_config.device,
        capture_config.sample_rate,
        capture_config.timeslice_ms
    );

    let capture = MediaCapture::new(
        Arc::new(NativeMediaDevices::new(
            capture_config.device.clone(),
            capture_config.sample_rate,
        )),
        Arc::new(NativeEncoderFactory),
        ctx.config.capture_settings(),
    );
    let backend: Arc<dyn SessionBackend> = Arc::new(ctx.client()?);

    let view = Arc::new(LiveView::new());
    let mut observers = Fanout::new().with(view.clone());
    let mut history_writer = None;
    match username.as_deref() {
        Some(username) if ctx.config.chat.enable_persistence => {
            let (history, writer) = HistoryObserver::spawn(ctx.history_store(), username);
            observers = observers.with(Arc::new(history));
            history_writer = Some(writer);
        }
        _ => {}
    }

    let controller = Arc::new(SessionController::new(capture, backend, Arc::new(observers)));

    let send_trigger = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&send_trigger))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let mut tui = SessionTui::new(&capture_config.device)?;
    tui.render(&view)?;

    if let Err(e) = controller.start().await {
        tui.cleanup()?;
        drop(tui);
        show_alert(
            AlertKind::Error,
            "Could not start session",
            &format!("{e}\n\nCheck your microphone and `hybridbot list-devices`."),
        )?;
        return Ok(());
    }

    ctx.credentials.current_session_id = controller.session_id();
    if let Err(e) = ctx.save_credentials() {
        tracing::warn!("Failed to store session id: {}", e);
    }

    let mut ending = false;
    loop {
        if send_trigger.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: sending turn via external trigger");
            spawn_turn(&controller);
        }

        match tui.handle_input()? {
            SessionCommand::Continue => {}
            SessionCommand::Send => spawn_turn(&controller),
            SessionCommand::End if !ending => {
                ending = true;
                if controller.stop().await == StopOutcome::Deferred {
                    tracing::info!("Waiting for the current turn before ending");
                }
            }
            SessionCommand::End => {}
        }

        tui.render(&view)?;

        if ending && controller.state() == SessionState::Idle {
            break;
        }
    }

    tui.cleanup()?;

    // The writer drains once the controller, and with it the observer, is gone.
    drop(controller);
    if let Some(writer) = history_writer {
        if tokio::time::timeout(HISTORY_FLUSH_TIMEOUT, writer).await.is_err() {
            tracing::warn!("Chat history writer did not finish; recent turns may be missing");
        }
    }

    ctx.credentials.current_session_id = None;
    if let Err(e) = ctx.save_credentials() {
        tracing::warn!("Failed to clear session id: {}", e);
    }

    tracing::info!("=== hybridbot live session ended ===");
    Ok(())
}

fn spawn_turn(controller: &Arc<SessionController>) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        controller.send_turn().await;
    });
}
