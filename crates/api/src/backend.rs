//! The inference backend as seen by the client.

use std::sync::Arc;

use async_trait::async_trait;
use cropwatch_core::{MetricsSnapshot, Prediction};

use crate::error::Result;

/// An image ready to be sent to `POST /predict`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    /// Original file name
    pub file_name: String,
    /// Declared MIME type
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Wrap an in-memory image.
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Remote inference API.
///
/// The HTTP implementation lives in [`crate::HttpBackend`]; tests plug in
/// scripted implementations.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /metrics`.
    async fn metrics(&self) -> Result<MetricsSnapshot>;

    /// `GET /health`. `Ok` means the server answered 200.
    async fn health(&self) -> Result<()>;

    /// `POST /predict` with the image as multipart field `image`.
    async fn predict(&self, upload: &ImageUpload) -> Result<Prediction>;
}

#[async_trait]
impl<T: BackendApi + ?Sized> BackendApi for Arc<T> {
    async fn metrics(&self) -> Result<MetricsSnapshot> {
        (**self).metrics().await
    }

    async fn health(&self) -> Result<()> {
        (**self).health().await
    }

    async fn predict(&self, upload: &ImageUpload) -> Result<Prediction> {
        (**self).predict(upload).await
    }
}
