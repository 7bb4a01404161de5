//! Minimum spacing between outbound requests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Holds back each request until at least `spacing` has passed since the
/// previous one was issued.
///
/// The issue instant is recorded when the caller is let through, after any
/// wait. Concurrent callers queue on the internal lock, so they are released
/// one spacing apart.
#[derive(Debug)]
pub struct ThrottleGate {
    spacing: Duration,
    last_issued: Mutex<Option<Instant>>,
}

impl ThrottleGate {
    /// Create a gate that lets requests through `spacing` apart.
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_issued: Mutex::new(None),
        }
    }

    /// Wait for the gate to open and claim the current instant as the issue
    /// time of a new request.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last_issued.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.spacing {
                let wait = self.spacing - elapsed;
                debug!("Throttling request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }

    /// When the most recent request was let through.
    pub async fn last_issued(&self) -> Option<Instant> {
        *self.last_issued.lock().await
    }
}
