//! Client-side upload checks.

use std::path::Path;

use cropwatch_api::ImageUpload;
use cropwatch_core::config::{ACCEPTED_IMAGE_TYPES, DEFAULT_MAX_UPLOAD_BYTES};
use cropwatch_core::ClientConfig;
use tracing::debug;

use crate::error::{DetectionError, Result, ValidationError};

/// MIME type used when the extension is not a known image type.
const UNKNOWN_MIME: &str = "application/octet-stream";

/// Infer an image MIME type from a file extension, case-insensitively.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => UNKNOWN_MIME,
    }
}

/// What the backend is willing to receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted upload in bytes
    pub max_bytes: u64,
    /// Accepted MIME types
    pub accepted_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_types: ACCEPTED_IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl From<&ClientConfig> for UploadPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            accepted_types: config.accepted_image_types.clone(),
        }
    }
}

impl UploadPolicy {
    /// Check a size and MIME type. Size is checked first.
    pub fn check(&self, size: u64, content_type: &str) -> std::result::Result<(), ValidationError> {
        if size > self.max_bytes {
            return Err(ValidationError::FileTooLarge { size, max: self.max_bytes });
        }
        if !self.accepts(content_type) {
            return Err(ValidationError::UnsupportedType(content_type.to_string()));
        }
        Ok(())
    }

    /// Check an in-memory upload.
    pub fn validate(&self, upload: &ImageUpload) -> std::result::Result<(), ValidationError> {
        self.check(upload.size(), &upload.content_type)
    }

    /// Whether `content_type` is on the accepted list.
    pub fn accepts(&self, content_type: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    /// Read an image file into an upload.
    ///
    /// The size (from file metadata) and the type (from the extension) are
    /// checked before the contents are read, so an oversized file is never
    /// loaded into memory.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<ImageUpload> {
        let path = path.as_ref();
        let io_err = |source| DetectionError::Io { path: path.to_path_buf(), source };

        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        let content_type = mime_for_path(path);
        self.check(metadata.len(), content_type)?;

        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        // The file may have grown since the metadata was read.
        self.check(bytes.len() as u64, content_type)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Loaded {} ({} bytes, {})", file_name, bytes.len(), content_type);

        Ok(ImageUpload::new(file_name, content_type, bytes))
    }
}
