//! cropwatch core data models.
//!
//! This crate defines the data structures shared by the metrics monitor and
//! the detection flow: metrics snapshots, predictions, client configuration
//! and the formatting helpers used to present them.

#![warn(missing_docs)]

// Core identities
mod id;

// Backend payloads
mod metrics;
mod prediction;

// Configuration and presentation
pub mod config;
pub mod format;

// Re-exports
pub use id::*;

pub use metrics::{MetricsSnapshot, ModelInfo, ClassStat, SystemMetrics, ClassShare};
pub use prediction::{Prediction, PredictionRecord, Severity};
pub use config::{ClientConfig, ConfigError};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
