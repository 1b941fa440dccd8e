/// Lifecycle of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No hardware acquired, no backend session
    #[default]
    Idle,
    /// Capture running and accepting turns
    Active,
    /// One turn submission in flight
    Processing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Processing => write!(f, "processing"),
        }
    }
}
