//! reqwest-backed implementation of [`BackendApi`].

use async_trait::async_trait;
use cropwatch_core::{ClientConfig, MetricsSnapshot, Prediction};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, Response};
use tracing::{debug, warn};

use crate::backend::{BackendApi, ImageUpload};
use crate::error::{ApiError, Result};
use crate::wire;

/// Inference API client over HTTPS.
#[derive(Clone)]
pub struct HttpBackend {
    /// HTTP client
    client: Client,

    /// Base URL, without trailing slash
    base_url: String,
}

impl HttpBackend {
    /// Build a client from configuration. The configured request timeout
    /// bounds every call.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(concat!("cropwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn metrics(&self) -> Result<MetricsSnapshot> {
        let url = self.url("metrics");
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let body = successful_body(response).await?;
        wire::decode_metrics(&body)
    }

    async fn health(&self) -> Result<()> {
        let url = self.url("health");
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status().as_u16() != 200 {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn predict(&self, upload: &ImageUpload) -> Result<Prediction> {
        let url = self.url("predict");
        debug!("POST {} ({}, {} bytes)", url, upload.file_name, upload.size());

        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| ApiError::Transport(format!("invalid content type: {}", e)))?;
        let form = Form::new().part("image", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let body = successful_body(response).await?;
        wire::decode_prediction(&body)
    }
}

/// Read the body of a 2xx response, or turn the response into an error.
async fn successful_body(response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = wire::error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "unexpected status".to_string());
        warn!("Backend answered {}: {}", status, message);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(body.to_vec())
}
