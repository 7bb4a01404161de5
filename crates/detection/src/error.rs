//! Errors of the detection flow.

use std::path::PathBuf;

use cropwatch_api::ApiError;
use cropwatch_storage::StorageError;

/// Result alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// An upload refused before it reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Larger than the upload limit
    #[error("file is {size} bytes, the limit is {max} bytes")]
    FileTooLarge {
        /// Actual size
        size: u64,
        /// Allowed size
        max: u64,
    },

    /// MIME type outside the accepted list
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
}

/// Errors that can occur while running a detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// Rejected locally
    #[error("invalid upload: {0}")]
    Validation(#[from] ValidationError),

    /// The last health check found the server offline
    #[error("inference server is offline")]
    ServerOffline,

    /// The backend call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// History could not be read or written
    #[error("history storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The image file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl DetectionError {
    /// Whether the upload was refused without contacting the server.
    pub fn is_local(&self) -> bool {
        matches!(self, DetectionError::Validation(_) | DetectionError::Io { .. })
    }
}
