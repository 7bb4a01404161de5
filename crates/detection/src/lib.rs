//! Pest detection flow for cropwatch.
//!
//! Validates an image locally, checks that the inference server is up,
//! sends the image for prediction and records the result in a bounded,
//! persisted history.

#![warn(missing_docs)]

pub mod error;
pub mod service;
pub mod upload;

pub use error::{DetectionError, Result, ValidationError};
pub use service::{DetectionService, ServerStatus};
pub use upload::{mime_for_path, UploadPolicy};
