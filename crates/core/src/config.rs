//! Client configuration.
//!
//! Defaults are compiled in; a JSON file may override any subset of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URL of the deployed inference API.
pub const DEFAULT_API_BASE_URL: &str = "https://cropbugdetection.pythonanywhere.com";

/// Interval between scheduled metrics fetches, and the minimum spacing
/// between any two requests.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Upper bound for a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Retries after the first failed attempt of a fetch chain.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles for each further one.
pub const DEFAULT_BASE_RETRY_DELAY_MS: u64 = 1_000;

/// Largest accepted upload (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// MIME types the backend accepts.
pub const ACCEPTED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// Number of predictions kept in the local history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Directory holding client-side state.
pub const DEFAULT_DATA_DIR: &str = ".cropwatch";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed JSON
    #[error("invalid config {path}: {source}")]
    Json {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Semantically invalid value
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Everything the client needs to talk to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the inference API, without trailing slash
    pub base_url: String,

    /// Metrics polling interval
    pub poll_interval_ms: u64,

    /// Minimum spacing between two requests; `None` follows the poll interval
    pub min_request_spacing_ms: Option<u64>,

    /// Per-request timeout
    pub request_timeout_ms: u64,

    /// Retries after a failed fetch
    pub max_retries: u32,

    /// First backoff delay
    pub base_retry_delay_ms: u64,

    /// Largest accepted upload
    pub max_upload_bytes: u64,

    /// Accepted upload MIME types
    pub accepted_image_types: Vec<String>,

    /// Predictions kept in history
    pub history_capacity: usize,

    /// Where client-side state lives
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            min_request_spacing_ms: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay_ms: DEFAULT_BASE_RETRY_DELAY_MS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_image_types: ACCEPTED_IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Override the base URL, dropping any trailing slash.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Scheduled fetch interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Minimum spacing between two outbound requests.
    pub fn min_request_spacing(&self) -> Duration {
        Duration::from_millis(self.min_request_spacing_ms.unwrap_or(self.poll_interval_ms))
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// First backoff delay.
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    /// File holding the prediction history.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("prediction_history.json")
    }
}
