use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    /// A server-built envelope could not be encoded.
    Serialize(serde_json::Error),
    /// The dispatcher task is no longer accepting work.
    DispatcherGone,
    /// The session was removed from the hub and may no longer relay.
    NotMember,
    Transport(axum::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Serialize(e) => write!(f, "failed to encode envelope: {e}"),
            RelayError::DispatcherGone => f.write_str("dispatcher has shut down"),
            RelayError::NotMember => f.write_str("session is no longer registered"),
            RelayError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Serialize(e) => Some(e),
            RelayError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialize(e)
    }
}

impl From<axum::Error> for RelayError {
    fn from(e: axum::Error) -> Self {
        RelayError::Transport(e)
    }
}
