//! Metrics snapshot model - what the backend reports about itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use crate::Time;

/// One immutable metrics payload, as produced by the backend at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Static description of the deployed model
    pub model: ModelInfo,

    /// Prediction counts per pest label
    pub predictions: BTreeMap<String, ClassStat>,

    /// Operational gauges
    pub system: SystemMetrics,

    /// When the backend produced the snapshot (ISO-8601, verbatim)
    pub timestamp: String,
}

/// Descriptive fields of the deployed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Number of classes the model distinguishes
    pub classes: u32,

    /// Expected input dimension (pixels per side)
    pub input_size: u32,

    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,

    /// Accepted image formats
    pub supported_formats: Vec<String>,

    /// Model version string
    pub version: String,
}

/// How often one label has been predicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStat {
    /// Number of predictions
    pub count: u64,

    /// Share of all predictions, 0-100
    pub percentage: f64,
}

/// Operational gauges of the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Average inference time in milliseconds
    pub avg_inference_time: f64,

    /// CPU usage percentage
    pub cpu_usage: f64,

    /// Failed request count
    pub failed_requests: u64,

    /// Memory usage percentage
    pub memory_usage: f64,

    /// Requests handled during the last minute
    pub requests_per_minute: u64,

    /// Success rate percentage
    pub success_rate: f64,

    /// Total request count
    pub total_requests: u64,

    /// Server uptime in seconds
    pub uptime_seconds: u64,
}

impl SystemMetrics {
    /// Requests that did not fail. Saturates when the backend reports more
    /// failures than requests.
    pub fn successful_requests(&self) -> u64 {
        self.total_requests.saturating_sub(self.failed_requests)
    }

    /// Failed requests as a percentage of all requests.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64 * 100.0
    }
}

/// One entry of the class distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassShare {
    /// Pest label
    pub name: String,
    /// Number of predictions
    pub count: u64,
    /// Share of all predictions, 0-100
    pub percentage: f64,
}

impl MetricsSnapshot {
    /// Labels that were predicted at least once, most frequent first.
    pub fn class_distribution(&self) -> Vec<ClassShare> {
        let mut shares: Vec<_> = self
            .predictions
            .iter()
            .filter(|(_, stat)| stat.count > 0)
            .map(|(name, stat)| ClassShare {
                name: name.clone(),
                count: stat.count,
                percentage: stat.percentage,
            })
            .collect();

        // BTreeMap iteration already orders ties by label
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares
    }

    /// The most frequently predicted label, if any prediction was made.
    pub fn top_class(&self) -> Option<ClassShare> {
        self.class_distribution().into_iter().next()
    }

    /// Parse the backend timestamp.
    ///
    /// Accepts RFC 3339 as well as the naive `YYYY-MM-DDTHH:MM:SS[.f]` form,
    /// which is taken to be UTC.
    pub fn produced_at(&self) -> Option<Time> {
        if let Ok(t) = chrono::DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(t.with_timezone(&chrono::Utc));
        }
        chrono::NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
