//! Plain-text rendering of snapshots, predictions and poller state.

use std::fmt::Write;

use cropwatch_core::format::{format_bytes, format_millis, format_percent, format_uptime};
use cropwatch_core::{MetricsSnapshot, PredictionRecord};
use cropwatch_monitor::{PollPhase, PollerStatus};

pub fn snapshot(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    let model = &snapshot.model;
    let system = &snapshot.system;

    let produced = snapshot
        .produced_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| snapshot.timestamp.clone());
    let _ = writeln!(out, "Metrics at {}", produced);

    let _ = writeln!(out, "Model");
    let _ = writeln!(out, "  Version: {}", model.version);
    let _ = writeln!(out, "  Classes: {}", model.classes);
    let _ = writeln!(out, "  Input size: {}x{}", model.input_size, model.input_size);
    let _ = writeln!(out, "  Max file size: {}", format_bytes(model.max_file_size));
    let _ = writeln!(out, "  Formats: {}", model.supported_formats.join(", "));

    let _ = writeln!(out, "System");
    let _ = writeln!(out, "  Uptime: {}", format_uptime(system.uptime_seconds));
    let _ = writeln!(out, "  CPU: {}", format_percent(system.cpu_usage));
    let _ = writeln!(out, "  Memory: {}", format_percent(system.memory_usage));
    let _ = writeln!(out, "  Avg inference: {}", format_millis(system.avg_inference_time));
    let _ = writeln!(out, "  Requests/min: {}", system.requests_per_minute);
    let _ = writeln!(
        out,
        "  Requests: {} total, {} ok, {} failed ({} failure rate)",
        system.total_requests,
        system.successful_requests(),
        system.failed_requests,
        format_percent(system.failure_rate())
    );
    let _ = writeln!(out, "  Success rate: {}", format_percent(system.success_rate));

    let shares = snapshot.class_distribution();
    if shares.is_empty() {
        let _ = writeln!(out, "Detections: none yet");
    } else {
        let _ = writeln!(out, "Detections");
        for share in shares {
            let _ = writeln!(
                out,
                "  {:<24} {:>6}  {}",
                share.name,
                share.count,
                format_percent(share.percentage)
            );
        }
    }
    out
}

/// One-line summary of where the poller stands.
pub fn status_line(status: &PollerStatus) -> String {
    let mut line = match status.phase {
        PollPhase::Backoff(n) => format!("retrying (attempt {})", n),
        phase => phase.to_string(),
    };
    if let Some(error) = &status.last_error {
        match error.status_code {
            Some(code) => {
                let _ = write!(line, ": {} [HTTP {}]", error.message, code);
            }
            None => {
                let _ = write!(line, ": {}", error.message);
            }
        }
    }
    if let Some(at) = status.last_update {
        let _ = write!(line, " (last update {})", at.format("%H:%M:%S"));
    }
    line
}

pub fn prediction(record: &PredictionRecord) -> String {
    let mut out = String::new();
    let p = &record.prediction;

    let _ = writeln!(out, "{}: {}", record.file_name, p.pest_name);
    let _ = writeln!(out, "  Confidence: {}", format_percent(p.confidence));
    let _ = writeln!(out, "  Severity: {}", p.severity);
    let _ = writeln!(out, "  Treatment: {}", p.treatment);
    if let Some(ms) = p.inference_time {
        let _ = writeln!(out, "  Inference: {}", format_millis(ms));
    }
    if let Some(version) = &p.model_version {
        let _ = writeln!(out, "  Model: {}", version);
    }

    let ranked = p.ranked_probabilities();
    if !ranked.is_empty() {
        let _ = writeln!(out, "  Probabilities");
        for (label, prob) in ranked.into_iter().take(5) {
            let _ = writeln!(out, "    {:<24} {}", label, format_percent(prob * 100.0));
        }
    }
    out
}

/// History row: time, file, pest and confidence.
pub fn history_row(record: &PredictionRecord) -> String {
    format!(
        "{}  {:<20} {:<24} {:>6}  {}",
        record.recorded_at.format("%Y-%m-%d %H:%M"),
        record.file_name,
        record.prediction.pest_name,
        format_percent(record.prediction.confidence),
        record.prediction.severity
    )
}
