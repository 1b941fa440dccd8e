//! Listener interface for everything a live session wants to show.

use std::sync::Arc;
use std::time::Duration;

use super::state::SessionState;
use crate::emotion::RiskLevel;

/// Who a chat line belongs to and how it should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Something the user said
    User,
    /// Placeholder shown while the user's turn is being processed
    Pending,
    /// Reply from the backend
    Bot,
    /// Session notices
    System,
    /// Failures reported to the user
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub kind: MessageKind,
    pub state: Option<String>,
    pub risk: Option<RiskLevel>,
}

impl ChatMessage {
    pub fn new(sender: &str, text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            sender: sender.to_string(),
            text: text.into(),
            kind,
            state: None,
            risk: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("System", text, MessageKind::System)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new("System", text, MessageKind::Error)
    }

    pub fn bot(text: impl Into<String>, state: Option<String>, risk: Option<RiskLevel>) -> Self {
        Self {
            state,
            risk,
            ..Self::new("HybridBot", text, MessageKind::Bot)
        }
    }
}

/// Receives session output. Every method defaults to doing nothing, so
/// implementors only override what they display.
pub trait SessionObserver: Send + Sync {
    fn chat(&self, _message: ChatMessage) {}

    fn emotion(&self, _state: &str, _risk: RiskLevel) {}

    fn timer(&self, _elapsed: Duration) {}

    fn state_changed(&self, _state: SessionState) {}
}

/// Observer for contexts with nothing to display.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Forwards every event to each inner observer in order.
#[derive(Default, Clone)]
pub struct Fanout {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl SessionObserver for Fanout {
    fn chat(&self, message: ChatMessage) {
        for observer in &self.observers {
            observer.chat(message.clone());
        }
    }

    fn emotion(&self, state: &str, risk: RiskLevel) {
        for observer in &self.observers {
            observer.emotion(state, risk);
        }
    }

    fn timer(&self, elapsed: Duration) {
        for observer in &self.observers {
            observer.timer(elapsed);
        }
    }

    fn state_changed(&self, state: SessionState) {
        for observer in &self.observers {
            observer.state_changed(state);
        }
    }
}
