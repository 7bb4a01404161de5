//! Errors raised while talking to the inference backend.

/// Result alias for backend calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// A failed backend call.
///
/// Every variant is retryable from the caller's point of view; the poller
/// does not distinguish them beyond what it reports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Network unreachable, DNS failure, connection reset
    #[error("request failed: {0}")]
    Transport(String),

    /// The call did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status
    #[error("server returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Well-formed response carrying `success: false`
    #[error("{0}")]
    Rejected(String),

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Parse(String),
}

impl ApiError {
    /// HTTP status attached to the failure, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether no usable response arrived at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Timeout)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
