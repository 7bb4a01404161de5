//! Observable poller state.

use std::sync::Arc;

use cropwatch_api::ApiError;
use cropwatch_core::{MetricsSnapshot, Time};

/// Where the poller is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// Waiting for the next tick or a manual refresh
    #[default]
    Idle,
    /// A request is being throttled or awaited
    Fetching,
    /// Waiting before retry `n` (1-based)
    Backoff(u32),
    /// Retries exhausted; the last error stands until the next cycle
    Failed,
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollPhase::Idle => write!(f, "idle"),
            PollPhase::Fetching => write!(f, "fetching"),
            PollPhase::Backoff(n) => write!(f, "backoff (retry {})", n),
            PollPhase::Failed => write!(f, "failed"),
        }
    }
}

/// The last fetch failure, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    /// What went wrong
    pub message: String,
    /// HTTP status, when the server answered
    pub status_code: Option<u16>,
}

impl From<&ApiError> for FetchError {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status_code(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything a view needs to render the metrics dashboard.
#[derive(Debug, Clone, Default)]
pub struct PollerStatus {
    /// Current phase
    pub phase: PollPhase,
    /// Most recent successful snapshot
    pub latest_snapshot: Option<Arc<MetricsSnapshot>>,
    /// Most recent failure, cleared by a success or a manual refresh
    pub last_error: Option<FetchError>,
    /// Retries made in the current chain
    pub retry_count: u32,
    /// Whether a retry is scheduled
    pub is_retrying: bool,
    /// Wall-clock time of the last successful fetch
    pub last_update: Option<Time>,
}

impl PollerStatus {
    /// Whether the dashboard has anything to show yet.
    pub fn has_data(&self) -> bool {
        self.latest_snapshot.is_some()
    }
}
