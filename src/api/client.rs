//! reqwest client for the HybridBot backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::error::BackendError;
use super::types::{
    AdminSession, AdminStats, AdminUser, ChatReply, ChatRequest, Credentials, HistoryMessage,
    HistoryPage, LoginResponse, MessageBody, SessionEndAck, SessionRef, SessionStarted,
    TurnMetadata, TurnReply,
};
use super::SessionBackend;
use crate::capture::TurnBuffer;

/// HTTP client bound to one backend base URL and, optionally, one user token.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:5000`).
    ///
    /// # Errors
    /// - If the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Returns a copy of this client that sends `token` as bearer auth.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `POST /auth/login`
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, BackendError> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&Credentials { username, password });
        let response = send(request, "login").await?;
        decode(checked(response).await?).await
    }

    /// `POST /auth/register`, returning the server's message.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, BackendError> {
        let request = self
            .http
            .post(self.url("/auth/register"))
            .json(&Credentials { username, password });
        let response = send(request, "register").await?;
        let body: MessageBody = decode(checked(response).await?).await?;
        Ok(body.msg.unwrap_or_else(|| "Registration complete".to_string()))
    }

    /// `GET /api/chat_history`
    pub async fn chat_history(&self) -> Result<Vec<HistoryMessage>, BackendError> {
        let request = self.authorized(self.http.get(self.url("/api/chat_history")));
        let response = send(request, "chat history").await?;
        let page: HistoryPage = decode(checked(response).await?).await?;
        Ok(page.messages)
    }

    /// `POST /api/chat`
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, BackendError> {
        let request = self
            .authorized(self.http.post(self.url("/api/chat")))
            .json(&ChatRequest {
                message,
                session_id,
            });
        let response = send(request, "chat").await?;
        decode(checked(response).await?).await
    }

    /// `GET /admin/stats`
    pub async fn admin_stats(&self) -> Result<AdminStats, BackendError> {
        self.admin_get("/admin/stats").await
    }

    /// `GET /admin/users`
    pub async fn admin_users(&self) -> Result<Vec<AdminUser>, BackendError> {
        self.admin_get("/admin/users").await
    }

    /// `GET /admin/sessions`
    pub async fn admin_sessions(&self) -> Result<Vec<AdminSession>, BackendError> {
        self.admin_get("/admin/sessions").await
    }

    async fn admin_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let request = self.authorized(self.http.get(self.url(path)));
        let response = send(request, "admin").await?;
        decode(checked(response).await?).await
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionBackend for BackendClient {
    async fn start_session(&self) -> Result<String, BackendError> {
        let request = self.authorized(self.http.post(self.url("/api/multimodal_session/start")));
        let response = send(request, "session start").await?;
        let started: SessionStarted = decode(checked(response).await?).await?;
        tracing::info!("Backend session created: {}", started.session_id);
        Ok(started.session_id)
    }

    async fn end_session(&self, session_id: &str) -> Result<SessionEndAck, BackendError> {
        let request = self
            .authorized(self.http.post(self.url("/api/multimodal_session/end")))
            .json(&SessionRef { session_id });
        let response = send(request, "session end").await?;
        let response = checked(response).await?;
        // The acknowledgement body is informational only.
        let ack = response.json::<SessionEndAck>().await.unwrap_or_default();
        tracing::info!(
            "Backend session ended: {} (status: {})",
            session_id,
            ack.status.as_deref().unwrap_or("unknown")
        );
        Ok(ack)
    }

    async fn submit_turn(
        &self,
        turn: &TurnBuffer,
        session_id: Option<&str>,
        metadata: &TurnMetadata,
    ) -> Result<TurnReply, BackendError> {
        let audio = Part::bytes(turn.audio.clone())
            .file_name(turn.file_name.clone())
            .mime_str(&turn.mime_type)
            .map_err(|e| BackendError::Unavailable(format!("Failed to create audio part: {e}")))?;

        let mut form = Form::new().part("audio", audio);
        for (i, frame) in turn.frames.iter().enumerate() {
            let part = Part::bytes(frame.jpeg.clone())
                .file_name(format!("frame_{i}.jpg"))
                .mime_str("image/jpeg")
                .map_err(|e| BackendError::Unavailable(format!("Failed to create frame part: {e}")))?;
            form = form.part("frames", part);
        }

        if let Some(session_id) = session_id {
            tracing::debug!("Sending turn with session ID: {}", session_id);
            form = form.text("session_id", session_id.to_string());
        }

        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| BackendError::Unavailable(format!("Failed to encode metadata: {e}")))?;
        form = form.text("metadata", metadata_json);

        tracing::debug!(
            "Multimodal upload: audio={} bytes ({}), frames={}, session={:?}",
            turn.audio.len(),
            turn.mime_type,
            turn.frames.len(),
            session_id
        );

        let request = self
            .authorized(self.http.post(self.url("/api/multimodal_input")))
            .multipart(form);
        let response = send(request, "multimodal input").await?;
        let reply: TurnReply = decode(checked(response).await?).await?;

        tracing::debug!(
            "Predicted state: {:?}, risk level: {:?}",
            reply.state,
            reply.risk_level
        );
        if let Some(transcription) = &reply.transcription {
            tracing::debug!("Transcription: {}", transcription);
        }
        Ok(reply)
    }
}

/// Sends a request, turning transport failures into readable messages.
async fn send(request: RequestBuilder, what: &str) -> Result<Response, BackendError> {
    request.send().await.map_err(|e| {
        let message = if e.is_connect() {
            "Failed to connect to the HybridBot server. Check that it is running and reachable."
                .to_string()
        } else if e.is_timeout() {
            format!("Request for {what} timed out. The server is not responding.")
        } else if e.is_builder() {
            format!("Failed to build {what} request: {e}. Check the configured server URL.")
        } else {
            format!("Network error during {what}: {e}")
        };
        tracing::error!("{}", message);
        BackendError::Unavailable(message)
    })
}

/// Passes successful responses through and maps error statuses.
async fn checked(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let server_message = serde_json::from_str::<MessageBody>(&body)
        .ok()
        .and_then(|b| b.msg.or(b.error));

    tracing::warn!("Backend returned {}: {}", status, body);

    Err(match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized(
            server_message.unwrap_or_else(|| "Session expired. Please log in again.".to_string()),
        ),
        StatusCode::FORBIDDEN => BackendError::Forbidden,
        s if s.is_server_error() && server_message.is_none() => BackendError::Unavailable(
            "The HybridBot server is experiencing issues. Please try again later.".to_string(),
        ),
        s => BackendError::Rejected {
            status: s.as_u16(),
            message: server_message.unwrap_or_else(|| format!("Request failed with status {s}")),
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::Unavailable(format!("Failed to parse server response: {e}")))
}
