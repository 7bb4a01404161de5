//! Metrics monitoring for cropwatch.
//!
//! [`MetricsPoller`] keeps a fresh metrics snapshot from the inference
//! backend. It spaces requests with a [`ThrottleGate`], retries failures
//! under a [`BackoffPolicy`] and publishes a [`PollerStatus`] for views to
//! render.

#![warn(missing_docs)]

pub mod backoff;
pub mod poller;
pub mod state;
pub mod throttle;

pub use backoff::BackoffPolicy;
pub use poller::{MetricsPoller, PollerConfig, PollerError};
pub use state::{FetchError, PollPhase, PollerStatus};
pub use throttle::ThrottleGate;
