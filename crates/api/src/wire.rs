//! Response envelopes of the inference backend.
//!
//! Every endpoint answers `{"success": bool, ...}`. A body with
//! `success: false` is a failure even when the HTTP status is 200.

use cropwatch_core::{MetricsSnapshot, Prediction};
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Decode the body of `GET /metrics`.
pub fn decode_metrics(body: &[u8]) -> Result<MetricsSnapshot> {
    let mut envelope = parse_envelope(body, "Failed to fetch metrics")?;
    let metrics = envelope
        .get_mut("metrics")
        .map(Value::take)
        .ok_or_else(|| ApiError::Parse("missing `metrics` field".to_string()))?;
    serde_json::from_value(metrics).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Decode the body of `POST /predict`.
pub fn decode_prediction(body: &[u8]) -> Result<Prediction> {
    let envelope = parse_envelope(body, "Prediction failed")?;
    serde_json::from_value(envelope).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Pull a human-readable message out of an error body, if it has one.
pub fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_envelope(body: &[u8], default_failure: &str) -> Result<Value> {
    let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::Parse(e.to_string()))?;

    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::Parse("missing `success` flag".to_string()))?;

    if !success {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(default_failure);
        return Err(ApiError::Rejected(message.to_string()));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropwatch_core::Severity;
    use serde_json::json;

    fn metrics_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "success": true,
            "metrics": {
                "model": {
                    "classes": 3,
                    "input_size": 224,
                    "max_file_size": 5242880,
                    "supported_formats": ["jpg", "png"],
                    "version": "2.0"
                },
                "predictions": {"aphids": {"count": 2, "percentage": 100.0}},
                "system": {
                    "avg_inference_time": 50.0,
                    "cpu_usage": 10.0,
                    "failed_requests": 0,
                    "memory_usage": 20.0,
                    "requests_per_minute": 1,
                    "success_rate": 100.0,
                    "total_requests": 2,
                    "uptime_seconds": 60
                },
                "timestamp": "2024-05-01T10:00:00Z"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_metrics() {
        let snapshot = decode_metrics(&metrics_body()).unwrap();
        assert_eq!(snapshot.model.version, "2.0");
        assert_eq!(snapshot.predictions["aphids"].count, 2);
    }

    #[test]
    fn test_metrics_success_false_is_rejected() {
        let body = br#"{"success": false}"#;
        assert_eq!(
            decode_metrics(body),
            Err(ApiError::Rejected("Failed to fetch metrics".to_string()))
        );
    }

    #[test]
    fn test_malformed_metrics_is_parse_error() {
        assert!(matches!(decode_metrics(b"<html>502</html>"), Err(ApiError::Parse(_))));
        assert!(matches!(decode_metrics(br#"{"metrics": {}}"#), Err(ApiError::Parse(_))));
        assert!(matches!(
            decode_metrics(br#"{"success": true, "metrics": {"model": 1}}"#),
            Err(ApiError::Parse(_))
        ));
    }

    #[test]
    fn test_decode_prediction() {
        let body = serde_json::to_vec(&json!({
            "success": true,
            "pest_name": "armyworm",
            "confidence": 97.2,
            "treatment": "Bt spray",
            "severity": "high",
            "class_probabilities": {"armyworm": 0.972, "aphids": 0.028},
            "inference_time": 61.5,
            "model_version": "2.0"
        }))
        .unwrap();

        let prediction = decode_prediction(&body).unwrap();
        assert_eq!(prediction.pest_name, "armyworm");
        assert_eq!(prediction.severity, Severity::High);
        assert_eq!(prediction.inference_time, Some(61.5));
    }

    #[test]
    fn test_prediction_rejection_carries_message() {
        let body = br#"{"success": false, "message": "No pest detected"}"#;
        assert_eq!(
            decode_prediction(body),
            Err(ApiError::Rejected("No pest detected".to_string()))
        );
        assert_eq!(
            decode_prediction(br#"{"success": false}"#),
            Err(ApiError::Rejected("Prediction failed".to_string()))
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(br#"{"error": "too big"}"#), Some("too big".to_string()));
        assert_eq!(error_message(b"plain text"), None);
    }
}
