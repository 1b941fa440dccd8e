//! Emotional-state tracking for a conversation.
//!
//! Keeps the state/risk points reported by the backend and derives the
//! session statistics shown next to the chat.

pub mod labels;
pub mod tracker;

pub use labels::{risk_color, state_color, RiskLevel, DEFAULT_STATE};
pub use tracker::{EmotionPoint, EmotionTracker};
