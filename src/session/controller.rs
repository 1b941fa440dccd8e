//! Live session state machine.
//!
//! ```text
//! Idle --start--> Active --send--> Processing --reply/failure--> Active
//!                   |                   |
//!                   +------stop---------+--(deferred until the turn ends)--> Idle
//! ```
//!
//! All methods take `&self` so one controller can be shared between the input
//! loop and in-flight turns. The Active -> Processing gate is what keeps turn
//! submissions from overlapping: a send that finds the controller anywhere
//! but Active returns `TurnOutcome::Ignored` without touching capture.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;

use super::observer::{ChatMessage, MessageKind, SessionObserver};
use super::state::SessionState;
use super::timer::spawn_elapsed_timer;
use crate::api::{SessionBackend, TurnMetadata, TurnReply};
use crate::capture::{CaptureError, MediaCapture, PreviewSink};

const SESSION_STARTED: &str = "Live session started. Speak and press Enter to send.";
const NO_AUDIO: &str = "No audio detected. Please speak and try again.";
const TURN_FAILED: &str = "Error processing input. Please try again.";
const SESSION_ENDED: &str = "Session ended.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("A session is already running")]
    AlreadyStarted,
}

/// Result of a send gesture.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The controller was not Active; nothing happened
    Ignored,
    /// The drained buffer had no audio; the backend was not contacted
    EmptyTurn,
    /// The backend replied
    Replied(TurnReply),
    /// Submission failed; the message was shown to the user
    Failed(String),
}

/// Result of a stop gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The session was torn down
    Stopped,
    /// A start or a turn is in flight; teardown runs as soon as it finishes
    Deferred,
    /// Nothing was running
    AlreadyIdle,
}

/// Internal phases. `Starting` and `Stopping` are reported as Idle and
/// Active respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Active,
    Processing,
    Stopping,
}

impl Phase {
    fn public(self) -> SessionState {
        match self {
            Phase::Idle | Phase::Starting => SessionState::Idle,
            Phase::Active | Phase::Stopping => SessionState::Active,
            Phase::Processing => SessionState::Processing,
        }
    }
}

struct Inner {
    phase: Phase,
    session_id: Option<String>,
    timer: Option<JoinHandle<()>>,
    stop_requested: bool,
}

impl Inner {
    /// Moves to Stopping and hands over what teardown releases. Call it in
    /// the critical section that decided to stop.
    fn begin_stopping(&mut self) -> Teardown {
        self.phase = Phase::Stopping;
        self.stop_requested = false;
        Teardown {
            session_id: self.session_id.take(),
            timer: self.timer.take(),
        }
    }
}

/// Resources owned by a session that is being torn down.
struct Teardown {
    session_id: Option<String>,
    timer: Option<JoinHandle<()>>,
}

/// Mediates start/send/stop gestures against capture and the backend.
pub struct SessionController {
    capture: tokio::sync::Mutex<MediaCapture>,
    backend: Arc<dyn SessionBackend>,
    observer: Arc<dyn SessionObserver>,
    preview: Option<Arc<dyn PreviewSink>>,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(
        capture: MediaCapture,
        backend: Arc<dyn SessionBackend>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            capture: tokio::sync::Mutex::new(capture),
            backend,
            observer,
            preview: None,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                session_id: None,
                timer: None,
                stop_requested: false,
            }),
        }
    }

    /// Sets the surface that shows the live stream and supplies frames.
    pub fn with_preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn state(&self) -> SessionState {
        self.lock_inner().phase.public()
    }

    /// Backend session id, if registration succeeded.
    pub fn session_id(&self) -> Option<String> {
        self.lock_inner().session_id.clone()
    }

    /// Acquires hardware, starts continuous capture and registers a backend
    /// session.
    ///
    /// Backend registration is best-effort: on failure the session runs in
    /// standalone mode without a session id.
    ///
    /// # Errors
    /// - `AlreadyStarted` unless the controller is Idle
    /// - `Capture` if permissions or capture fail; hardware is released and
    ///   the controller stays Idle
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.lock_inner();
            if inner.phase != Phase::Idle {
                tracing::warn!("Start ignored: session is {}", inner.phase.public());
                return Err(SessionError::AlreadyStarted);
            }
            inner.phase = Phase::Starting;
            inner.stop_requested = false;
        }
        tracing::info!("Starting continuous session");

        if let Err(e) = self.acquire_capture().await {
            tracing::error!("Failed to start session: {}", e);
            self.lock_inner().phase = Phase::Idle;
            self.observer.chat(ChatMessage::error(e.to_string()));
            return Err(e.into());
        }

        let session_id = match self.backend.start_session().await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("Failed to create backend session, continuing standalone: {}", e);
                None
            }
        };

        let timer = spawn_elapsed_timer(Arc::clone(&self.observer));
        let pending_stop = {
            let mut inner = self.lock_inner();
            inner.session_id = session_id;
            inner.timer = Some(timer);
            if inner.stop_requested {
                Some(inner.begin_stopping())
            } else {
                inner.phase = Phase::Active;
                None
            }
        };

        if let Some(teardown) = pending_stop {
            tracing::info!("Applying stop requested during start");
            self.teardown(teardown).await;
            return Ok(());
        }

        self.observer.state_changed(SessionState::Active);
        self.observer.chat(ChatMessage::system(SESSION_STARTED));
        Ok(())
    }

    /// Drains the current buffer and submits it as one turn.
    ///
    /// Only one turn runs at a time; calls made while not Active return
    /// `Ignored`. The controller returns to Active whatever the backend does,
    /// unless a stop arrived meanwhile, in which case the session ends.
    pub async fn send_turn(&self) -> TurnOutcome {
        {
            let mut inner = self.lock_inner();
            if inner.phase != Phase::Active {
                tracing::debug!("Send ignored: session is {}", inner.phase.public());
                return TurnOutcome::Ignored;
            }
            inner.phase = Phase::Processing;
        }
        self.observer.state_changed(SessionState::Processing);
        tracing::info!("Sending turn");

        let outcome = self.process_turn().await;

        let pending_stop = {
            let mut inner = self.lock_inner();
            if inner.stop_requested {
                Some(inner.begin_stopping())
            } else {
                inner.phase = Phase::Active;
                None
            }
        };

        match pending_stop {
            Some(teardown) => {
                tracing::info!("Applying stop requested during turn");
                self.teardown(teardown).await;
            }
            None => self.observer.state_changed(SessionState::Active),
        }
        outcome
    }

    /// Ends the session: stops the timer, ends the backend session
    /// (best-effort) and releases the hardware.
    ///
    /// A stop that arrives while a start or a turn is in flight is queued and
    /// applied when that work completes.
    pub async fn stop(&self) -> StopOutcome {
        let teardown = {
            let mut inner = self.lock_inner();
            match inner.phase {
                Phase::Idle | Phase::Stopping => {
                    tracing::debug!("Stop ignored: nothing running");
                    return StopOutcome::AlreadyIdle;
                }
                Phase::Starting | Phase::Processing => {
                    tracing::info!("Stop requested while busy; deferring until current work ends");
                    inner.stop_requested = true;
                    return StopOutcome::Deferred;
                }
                Phase::Active => inner.begin_stopping(),
            }
        };
        self.teardown(teardown).await;
        StopOutcome::Stopped
    }

    async fn acquire_capture(&self) -> Result<(), CaptureError> {
        let mut capture = self.capture.lock().await;
        let started = match capture.request_permissions().await {
            Ok(()) => capture.start_continuous_capture(self.preview.clone()),
            Err(e) => Err(e),
        };
        if started.is_err() {
            capture.end_session();
        }
        started
    }

    async fn process_turn(&self) -> TurnOutcome {
        let drained = self.capture.lock().await.capture_current_buffer().await;

        let turn = match drained {
            Ok(Some(turn)) if turn.has_audio() => turn,
            Ok(_) => {
                tracing::info!("Turn skipped: no audio captured");
                self.observer.chat(ChatMessage::error(NO_AUDIO));
                return TurnOutcome::EmptyTurn;
            }
            Err(e) => {
                tracing::error!("Failed to capture turn buffer: {}", e);
                self.observer.chat(ChatMessage::error(TURN_FAILED));
                return TurnOutcome::Failed(e.to_string());
            }
        };

        self.observer
            .chat(ChatMessage::new("You", "Processing...", MessageKind::Pending));

        let session_id = self.session_id();
        let metadata = TurnMetadata::continuous(turn.captured_at);
        match self
            .backend
            .submit_turn(&turn, session_id.as_deref(), &metadata)
            .await
        {
            Ok(reply) => {
                if let Some(transcription) = reply.transcription.as_deref() {
                    self.observer
                        .chat(ChatMessage::new("You", transcription, MessageKind::User));
                }
                if !reply.response.is_empty() {
                    self.observer.chat(ChatMessage::bot(
                        reply.response.clone(),
                        reply.state.clone(),
                        reply.risk_level,
                    ));
                }
                if let (Some(state), Some(risk)) = (reply.state.as_deref(), reply.risk_level) {
                    self.observer.emotion(state, risk);
                }
                tracing::info!(
                    "Turn completed: state={:?}, risk={:?}",
                    reply.state,
                    reply.risk_level
                );
                TurnOutcome::Replied(reply)
            }
            Err(e) => {
                tracing::error!("Upload failed: {}", e);
                self.observer.chat(ChatMessage::error(TURN_FAILED));
                TurnOutcome::Failed(e.user_message())
            }
        }
    }

    async fn teardown(&self, teardown: Teardown) {
        tracing::info!("Ending session");

        if let Some(timer) = teardown.timer {
            timer.abort();
        }

        if let Some(session_id) = teardown.session_id {
            if let Err(e) = self.backend.end_session(&session_id).await {
                tracing::error!("Failed to end backend session {}: {}", session_id, e);
            }
        }

        self.capture.lock().await.end_session();

        self.lock_inner().phase = Phase::Idle;
        self.observer.state_changed(SessionState::Idle);
        self.observer.chat(ChatMessage::system(SESSION_ENDED));
        tracing::info!("Session ended");
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(timer) = self.lock_inner().timer.take() {
            timer.abort();
        }
    }
}
