use thiserror::Error;

/// Failures talking to the backend REST API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network failure, timeout, or an unparseable response body.
    #[error("{0}")]
    Unavailable(String),

    /// The access token is missing, invalid or expired.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the account lacks the required role.
    #[error("Access Denied: Admins Only")]
    Forbidden,

    /// The backend answered with an error status and message.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
}

impl BackendError {
    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
