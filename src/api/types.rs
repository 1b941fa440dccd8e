//! Request and response bodies of the backend REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::RiskLevel;

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful `/auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// `{msg}` bodies returned by auth endpoints and error responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionStarted {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionRef<'a> {
    pub session_id: &'a str,
}

/// Acknowledgement of `/api/multimodal_session/end`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionEndAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// `metadata` field sent with every multimodal turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnMetadata {
    pub timestamp: DateTime<Utc>,
    pub session_mode: String,
}

impl TurnMetadata {
    /// Metadata for a turn drained from a continuous capture session.
    pub fn continuous(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            session_mode: "continuous".to_string(),
        }
    }
}

/// Reply to a multimodal turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub transcription: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: Option<&'a str>,
}

/// Reply to a text chat message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

/// One stored message from `/api/chat_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub text: String,
    pub sender: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// Daily message counts for the admin dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyActivity {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_sessions: u64,
    #[serde(default)]
    pub total_messages: Option<u64>,
    #[serde(default)]
    pub avg_sessions_per_user: Option<f64>,
    #[serde(default)]
    pub active_models: Vec<String>,
    #[serde(default)]
    pub daily_activity: DailyActivity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub joined: String,
    pub role: String,
    pub sessions: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSession {
    pub id: i64,
    pub user: String,
    pub start: String,
    pub messages: u64,
    pub summary: String,
}
