use std::time::Duration;

/// Typed error hierarchy for calls to the external agent backend.
/// Any of these is a hard failure for an active run; there is no retry,
/// so the classification exists for logging and terminal-event tagging.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("backend error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl ClientError {
    /// Short classification string for logging and failure events.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Server { .. } => "server_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MalformedReply(_) => "malformed_reply",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400..=499 => Self::InvalidRequest(format!("status {status}: {body}")),
            500..=599 => Self::Server { status, body },
            _ => Self::MalformedReply(format!("unexpected status {status}: {body}")),
        }
    }
}
