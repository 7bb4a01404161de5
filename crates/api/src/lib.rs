//! Inference backend client.
//!
//! The backend is an external collaborator exposing `/metrics`, `/health`
//! and `/predict`. This crate defines the [`BackendApi`] seam the rest of
//! the workspace programs against, and its HTTP implementation.

#![warn(missing_docs)]

pub mod error;
pub mod backend;
pub mod http;
pub mod wire;

pub use error::{ApiError, Result};
pub use backend::{BackendApi, ImageUpload};
pub use http::HttpBackend;
