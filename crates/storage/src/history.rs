//! Bounded, most-recent-first prediction history.

use cropwatch_core::PredictionRecord;

/// The last few predictions, newest first. Pushing beyond the capacity
/// evicts the oldest record.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionHistory {
    records: Vec<PredictionRecord>,
    capacity: usize,
}

impl PredictionHistory {
    /// Create an empty history holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adopt a stored list (assumed newest first), trimming it to capacity.
    pub fn from_records(mut records: Vec<PredictionRecord>, capacity: usize) -> Self {
        records.truncate(capacity);
        Self { records, capacity }
    }

    /// Add a record as the newest entry.
    pub fn push(&mut self, record: PredictionRecord) {
        self.records.insert(0, record);
        self.records.truncate(self.capacity);
    }

    /// Records, newest first.
    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    /// Maximum number of records kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropwatch_core::{Prediction, Severity};

    fn record(n: usize) -> PredictionRecord {
        PredictionRecord::new(
            format!("leaf-{}.png", n),
            Prediction {
                pest_name: format!("pest-{}", n),
                confidence: 50.0,
                treatment: String::new(),
                severity: Severity::Unknown,
                class_probabilities: None,
                inference_time: None,
                model_version: None,
            },
        )
    }

    #[test]
    fn test_push_keeps_newest_first() {
        let mut history = PredictionHistory::new(10);
        history.push(record(1));
        history.push(record(2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].prediction.pest_name, "pest-2");
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = PredictionHistory::new(10);
        for n in 1..=13 {
            history.push(record(n));
        }

        let names: Vec<_> = history
            .records()
            .iter()
            .map(|r| r.prediction.pest_name.clone())
            .collect();
        let expected: Vec<_> = (4..=13).rev().map(|n| format!("pest-{}", n)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_from_records_trims() {
        let records: Vec<_> = (0..15).map(record).collect();
        let history = PredictionHistory::from_records(records, 10);
        assert_eq!(history.len(), 10);
        assert_eq!(history.records()[0].prediction.pest_name, "pest-0");
    }

    #[test]
    fn test_clear() {
        let mut history = PredictionHistory::new(3);
        history.push(record(1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }
}
