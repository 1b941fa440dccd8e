//! Live multimodal session: state machine, observers and the terminal view.

mod controller;
mod observer;
mod state;
mod timer;
pub mod ui;

pub use controller::{SessionController, SessionError, StopOutcome, TurnOutcome};
pub use observer::{ChatMessage, Fanout, MessageKind, NoopObserver, SessionObserver};
pub use state::SessionState;
pub use timer::{format_elapsed, spawn_elapsed_timer};
