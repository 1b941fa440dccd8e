//! Backend REST API client.
//!
//! `BackendClient` covers every endpoint the terminal client uses. The live
//! session only needs three of them, so the session controller depends on the
//! narrower `SessionBackend` trait instead of the concrete client.

mod client;
mod error;
mod types;

use async_trait::async_trait;

use crate::capture::TurnBuffer;

pub use client::BackendClient;
pub use error::BackendError;
pub use types::{
    AdminSession, AdminStats, AdminUser, ChatReply, DailyActivity, HistoryMessage, LoginResponse,
    SessionEndAck, TurnMetadata, TurnReply,
};

/// Backend operations used by a live multimodal session.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// `POST /api/multimodal_session/start`, returning the new session id.
    async fn start_session(&self) -> Result<String, BackendError>;

    /// `POST /api/multimodal_session/end`
    async fn end_session(&self, session_id: &str) -> Result<SessionEndAck, BackendError>;

    /// `POST /api/multimodal_input` with the drained turn.
    async fn submit_turn(
        &self,
        turn: &TurnBuffer,
        session_id: Option<&str>,
        metadata: &TurnMetadata,
    ) -> Result<TurnReply, BackendError>;
}
