//! Prediction model - one completed detection and its history record.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::id::RecordId;
use crate::Time;

/// How damaging the detected pest is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    /// Minor damage
    Low,
    /// Noticeable damage
    Medium,
    /// Severe damage, treat promptly
    High,
    /// Missing or unrecognized label
    #[default]
    Unknown,
}

impl Severity {
    /// Map a backend severity label. Matching ignores case; anything
    /// unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Unknown,
        }
    }

    /// Lowercase label, as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&label))
    }
}

/// The outcome of one inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Detected pest
    pub pest_name: String,

    /// Confidence, 0-100
    pub confidence: f64,

    /// Suggested treatment
    pub treatment: String,

    /// Severity of the infestation
    #[serde(default)]
    pub severity: Severity,

    /// Per-class probabilities, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_probabilities: Option<BTreeMap<String, f64>>,

    /// Server-side inference time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_time: Option<f64>,

    /// Version of the model that answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Prediction {
    /// Class probabilities sorted from most to least likely.
    pub fn ranked_probabilities(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<_> = self
            .class_probabilities
            .iter()
            .flatten()
            .map(|(label, p)| (label.as_str(), *p))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// A prediction kept in the local history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Unique identifier
    pub id: RecordId,

    /// When the client received the result
    pub recorded_at: Time,

    /// Name of the uploaded file
    #[serde(default)]
    pub file_name: String,

    /// The prediction itself
    #[serde(flatten)]
    pub prediction: Prediction,
}

impl PredictionRecord {
    /// Record a fresh prediction.
    pub fn new(file_name: impl Into<String>, prediction: Prediction) -> Self {
        Self {
            id: RecordId::new(),
            recorded_at: chrono::Utc::now(),
            file_name: file_name.into(),
            prediction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::from_label("HIGH"), Severity::High);
        assert_eq!(Severity::from_label(" Medium "), Severity::Medium);
        assert_eq!(Severity::from_label("low"), Severity::Low);
        assert_eq!(Severity::from_label("catastrophic"), Severity::Unknown);
        assert_eq!(Severity::Medium.to_string(), "medium");
    }

    #[test]
    fn test_prediction_deserializes_with_optional_fields_missing() {
        let prediction: Prediction = serde_json::from_value(serde_json::json!({
            "pest_name": "aphids",
            "confidence": 91.5,
            "treatment": "Neem oil spray",
            "severity": "Medium"
        }))
        .unwrap();

        assert_eq!(prediction.severity, Severity::Medium);
        assert!(prediction.class_probabilities.is_none());
        assert!(prediction.ranked_probabilities().is_empty());
    }

    #[test]
    fn test_ranked_probabilities() {
        let prediction = Prediction {
            pest_name: "beetle".to_string(),
            confidence: 70.0,
            treatment: "Hand picking".to_string(),
            severity: Severity::Low,
            class_probabilities: Some(BTreeMap::from([
                ("aphids".to_string(), 0.2),
                ("beetle".to_string(), 0.7),
                ("mites".to_string(), 0.1),
            ])),
            inference_time: Some(80.0),
            model_version: None,
        };

        let labels: Vec<_> = prediction.ranked_probabilities().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["beetle", "aphids", "mites"]);
    }

    #[test]
    fn test_record_flattens_prediction() {
        let record = PredictionRecord::new(
            "leaf.jpg",
            Prediction {
                pest_name: "mites".to_string(),
                confidence: 55.0,
                treatment: "Sulfur dust".to_string(),
                severity: Severity::High,
                class_probabilities: None,
                inference_time: None,
                model_version: Some("1.2.0".to_string()),
            },
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["pest_name"], "mites");
        assert_eq!(value["severity"], "high");
        assert!(value.get("inference_time").is_none());

        let back: PredictionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
