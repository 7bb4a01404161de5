//! Detection service.

use std::path::Path;

use cropwatch_api::{BackendApi, ImageUpload};
use cropwatch_core::PredictionRecord;
use cropwatch_storage::{HistoryStore, PredictionHistory};
use tracing::{debug, info, warn};

use crate::error::{DetectionError, Result};
use crate::upload::UploadPolicy;

/// Server availability as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerStatus {
    /// Not checked yet
    #[default]
    Unknown,
    /// `/health` answered 200
    Online,
    /// `/health` failed, or a call could not reach the server
    Offline,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Unknown => write!(f, "unknown"),
            ServerStatus::Online => write!(f, "online"),
            ServerStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Upload-and-predict flow with a persisted, bounded history.
pub struct DetectionService<A: BackendApi, S: HistoryStore> {
    api: A,
    store: S,
    policy: UploadPolicy,
    history: PredictionHistory,
    server: ServerStatus,
}

impl<A: BackendApi, S: HistoryStore> DetectionService<A, S> {
    /// Create a service with an empty in-memory history. Call
    /// [`DetectionService::mount`] to load the stored one.
    pub fn new(api: A, store: S, policy: UploadPolicy, history_capacity: usize) -> Self {
        Self {
            api,
            store,
            policy,
            history: PredictionHistory::new(history_capacity),
            server: ServerStatus::Unknown,
        }
    }

    /// Load the stored history and check the server.
    ///
    /// A history that cannot be read starts out empty.
    pub async fn mount(&mut self) -> ServerStatus {
        match self.store.load().await {
            Ok(records) => {
                debug!("Loaded {} history records", records.len());
                self.history = PredictionHistory::from_records(records, self.history.capacity());
            }
            Err(e) => {
                warn!("Ignoring unreadable prediction history: {}", e);
                self.history.clear();
            }
        }
        self.check_server().await
    }

    /// Ask `/health` whether the server is up.
    pub async fn check_server(&mut self) -> ServerStatus {
        self.server = match self.api.health().await {
            Ok(()) => ServerStatus::Online,
            Err(e) => {
                warn!("Health check failed: {}", e);
                ServerStatus::Offline
            }
        };
        info!("Inference server is {}", self.server);
        self.server
    }

    /// Validate an upload, send it for prediction and record the result.
    ///
    /// Validation failures never reach the network. An upload is refused
    /// while the last health check reported the server offline.
    pub async fn analyze(&mut self, upload: ImageUpload) -> Result<PredictionRecord> {
        self.policy.validate(&upload)?;
        if self.server == ServerStatus::Offline {
            return Err(DetectionError::ServerOffline);
        }

        let prediction = match self.api.predict(&upload).await {
            Ok(prediction) => prediction,
            Err(e) => {
                if e.is_transport() {
                    self.server = ServerStatus::Offline;
                }
                warn!("Prediction for {} failed: {}", upload.file_name, e);
                return Err(e.into());
            }
        };
        self.server = ServerStatus::Online;

        let record = PredictionRecord::new(upload.file_name, prediction);
        info!(
            "Detected {} ({:.1}%) in {}",
            record.prediction.pest_name, record.prediction.confidence, record.file_name
        );

        self.history.push(record.clone());
        // The prediction stands even if it cannot be persisted.
        if let Err(e) = self.store.save(self.history.records()).await {
            warn!("Failed to persist prediction history: {}", e);
        }
        Ok(record)
    }

    /// Read an image file and analyze it.
    pub async fn analyze_file(&mut self, path: impl AsRef<Path>) -> Result<PredictionRecord> {
        let upload = self.policy.read_file(path).await?;
        self.analyze(upload).await
    }

    /// Past predictions, newest first.
    pub fn history(&self) -> &[PredictionRecord] {
        self.history.records()
    }

    /// Forget every past prediction, in memory and in the store.
    pub async fn clear_history(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.history.clear();
        info!("Prediction history cleared");
        Ok(())
    }

    /// Server status as last observed.
    pub fn server_status(&self) -> ServerStatus {
        self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cropwatch_api::ApiError;
    use cropwatch_core::{MetricsSnapshot, Prediction, Severity};
    use cropwatch_storage::{JsonHistoryStore, MemoryHistoryStore};
    use tempfile::TempDir;

    use crate::error::ValidationError;

    /// Backend with a fixed health answer and a queue of predict outcomes.
    /// Predictions beyond the queue succeed.
    struct MockBackend {
        healthy: bool,
        outcomes: Mutex<VecDeque<ApiError>>,
        predict_calls: Mutex<usize>,
    }

    impl MockBackend {
        fn new(healthy: bool) -> Self {
            Self {
                healthy,
                outcomes: Mutex::new(VecDeque::new()),
                predict_calls: Mutex::new(0),
            }
        }

        fn failing_with(self, error: ApiError) -> Self {
            self.outcomes.lock().unwrap().push_back(error);
            self
        }

        fn predict_calls(&self) -> usize {
            *self.predict_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BackendApi for MockBackend {
        async fn metrics(&self) -> cropwatch_api::Result<MetricsSnapshot> {
            Err(ApiError::Rejected("not scripted".to_string()))
        }

        async fn health(&self) -> cropwatch_api::Result<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(ApiError::Status { status: 503, message: "Service Unavailable".to_string() })
            }
        }

        async fn predict(&self, upload: &ImageUpload) -> cropwatch_api::Result<Prediction> {
            let n = {
                let mut calls = self.predict_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if let Some(error) = self.outcomes.lock().unwrap().pop_front() {
                return Err(error);
            }
            Ok(Prediction {
                pest_name: format!("pest-{}", n),
                confidence: 91.5,
                treatment: format!("treat {}", upload.file_name),
                severity: Severity::High,
                class_probabilities: None,
                inference_time: Some(42.0),
                model_version: Some("1.0".to_string()),
            })
        }
    }

    fn png(name: &str, size: usize) -> ImageUpload {
        ImageUpload::new(name, "image/png", vec![0u8; size])
    }

    fn service<S: HistoryStore>(backend: MockBackend, store: S) -> DetectionService<std::sync::Arc<MockBackend>, S> {
        DetectionService::new(std::sync::Arc::new(backend), store, UploadPolicy::default(), 10)
    }

    #[tokio::test]
    async fn test_oversized_upload_never_reaches_network() {
        let mut svc = service(MockBackend::new(true), MemoryHistoryStore::new());
        svc.mount().await;

        let err = svc.analyze(png("big.png", 6_000_000)).await.unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Validation(ValidationError::FileTooLarge { size: 6_000_000, .. })
        ));
        assert!(err.is_local());
        assert_eq!(svc.api.predict_calls(), 0);
        assert!(svc.history().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected() {
        let mut svc = service(MockBackend::new(true), MemoryHistoryStore::new());
        let upload = ImageUpload::new("notes.txt", "text/plain", vec![1, 2, 3]);

        let err = svc.analyze(upload).await.unwrap_err();
        assert!(matches!(err, DetectionError::Validation(ValidationError::UnsupportedType(_))));
        assert_eq!(svc.api.predict_calls(), 0);
    }

    #[tokio::test]
    async fn test_offline_server_refuses_upload() {
        let mut svc = service(MockBackend::new(false), MemoryHistoryStore::new());
        assert_eq!(svc.mount().await, ServerStatus::Offline);

        let err = svc.analyze(png("leaf.png", 10)).await.unwrap_err();
        assert!(matches!(err, DetectionError::ServerOffline));
        assert_eq!(svc.api.predict_calls(), 0);
    }

    #[tokio::test]
    async fn test_prediction_is_recorded_and_persisted() {
        let store = MemoryHistoryStore::new();
        let mut svc = service(MockBackend::new(true), store.clone());
        assert_eq!(svc.mount().await, ServerStatus::Online);

        let record = svc.analyze(png("leaf.png", 10)).await.unwrap();
        assert_eq!(record.file_name, "leaf.png");
        assert_eq!(record.prediction.pest_name, "pest-1");
        assert_eq!(svc.history().len(), 1);

        assert_eq!(store.writes().await, 1);
        let stored = store.load().await.unwrap();
        assert_eq!(stored[0].id, record.id);
    }

    #[tokio::test]
    async fn test_history_keeps_ten_newest() {
        let store = MemoryHistoryStore::new();
        let mut svc = service(MockBackend::new(true), store.clone());
        svc.mount().await;

        for n in 1..=12 {
            svc.analyze(png(&format!("leaf-{}.png", n), 10)).await.unwrap();
        }

        let names: Vec<_> = svc.history().iter().map(|r| r.file_name.clone()).collect();
        let expected: Vec<_> = (3..=12).rev().map(|n| format!("leaf-{}.png", n)).collect();
        assert_eq!(names, expected);
        assert_eq!(store.load().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_rejected_prediction_surfaces_message() {
        let backend = MockBackend::new(true)
            .failing_with(ApiError::Rejected("No pest detected".to_string()));
        let mut svc = service(backend, MemoryHistoryStore::new());
        svc.mount().await;

        let err = svc.analyze(png("leaf.png", 10)).await.unwrap_err();
        assert_eq!(err.to_string(), "No pest detected");
        assert_eq!(svc.server_status(), ServerStatus::Online);
        assert!(svc.history().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_marks_server_offline() {
        let backend = MockBackend::new(true)
            .failing_with(ApiError::Transport("connection refused".to_string()));
        let mut svc = service(backend, MemoryHistoryStore::new());
        svc.mount().await;

        let err = svc.analyze(png("leaf.png", 10)).await.unwrap_err();
        assert!(matches!(err, DetectionError::Api(ApiError::Transport(_))));
        assert_eq!(svc.server_status(), ServerStatus::Offline);

        let err = svc.analyze(png("leaf.png", 10)).await.unwrap_err();
        assert!(matches!(err, DetectionError::ServerOffline));
        assert_eq!(svc.api.predict_calls(), 1);
    }

    #[tokio::test]
    async fn test_mount_restores_history_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prediction_history.json");

        let first = {
            let store = JsonHistoryStore::new(&path).await.unwrap();
            let mut svc = service(MockBackend::new(true), store);
            svc.mount().await;
            svc.analyze(png("leaf.png", 10)).await.unwrap()
        };

        let store = JsonHistoryStore::new(&path).await.unwrap();
        let mut svc = service(MockBackend::new(true), store);
        svc.mount().await;
        assert_eq!(svc.history().len(), 1);
        assert_eq!(svc.history()[0].id, first.id);
    }

    #[tokio::test]
    async fn test_corrupt_history_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prediction_history.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonHistoryStore::new(&path).await.unwrap();
        let mut svc = service(MockBackend::new(true), store);
        assert_eq!(svc.mount().await, ServerStatus::Online);
        assert!(svc.history().is_empty());

        svc.analyze(png("leaf.png", 10)).await.unwrap();
        assert_eq!(svc.history().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let store = MemoryHistoryStore::new();
        let mut svc = service(MockBackend::new(true), store.clone());
        svc.mount().await;
        svc.analyze(png("leaf.png", 10)).await.unwrap();

        svc.clear_history().await.unwrap();
        assert!(svc.history().is_empty());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.JPG");
        tokio::fs::write(&path, b"jpeg bytes").await.unwrap();

        let mut svc = service(MockBackend::new(true), MemoryHistoryStore::new());
        svc.mount().await;
        let record = svc.analyze_file(&path).await.unwrap();
        assert_eq!(record.file_name, "leaf.JPG");
        assert_eq!(record.prediction.treatment, "treat leaf.JPG");
    }
}
