//! Output generation for query and audit results.
//!
//! Every command can emit an [`OperationResult`] envelope as JSON, or a
//! short plain-text summary meant for a terminal.

use crate::audit::{AuditEvent, CollectorStatus, PipelineAction};
use crate::models::ConfidenceLevel;
use crate::query::QueryResult;
use crate::store::{AuditTrail, Snapshot};
use anyhow::Result;
use serde::Serialize;

/// Discriminated success/failure envelope around a command result.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Serialize an envelope as pretty JSON.
pub fn generate_json<T: Serialize>(result: &OperationResult<T>) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Plain-text summary of a query result.
pub fn generate_query_summary(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Total points: {}\n", result.total_points));

    match (&result.time_range.earliest, &result.time_range.latest) {
        (Some(earliest), Some(latest)) => {
            output.push_str(&format!("Time range:   {} .. {}\n", earliest, latest));
        }
        _ => output.push_str("Time range:   (none)\n"),
    }

    output.push_str("\nBy source:\n");
    if result.source_breakdown.is_empty() {
        output.push_str("  (none)\n");
    }
    for (source, count) in &result.source_breakdown {
        output.push_str(&format!("  {:<8} {:>6}\n", source.to_string(), count));
    }

    output.push_str("\nBy confidence:\n");
    for level in [ConfidenceLevel::High, ConfidenceLevel::Medium, ConfidenceLevel::Low] {
        let count = result.confidence_breakdown.get(&level).copied().unwrap_or(0);
        output.push_str(&format!("  {:<8} {:>6}\n", level.to_string(), count));
    }

    if !result.locations.is_empty() {
        output.push_str("\nLocations:\n");
        for point in &result.locations {
            let inferred = if point.is_inferred() {
                format!(
                    " (inferred: {}; {})",
                    point.inference_method().unwrap_or("unknown"),
                    point.inference_risk().unwrap_or("unknown risk")
                )
            } else {
                String::new()
            };
            let precision = match point.precision_meters() {
                Some(meters) => format!("±{:.0}m", meters),
                None => "-".to_string(),
            };
            output.push_str(&format!(
                "  {}  {:>10.5} {:>11.5}  {:<7} {:<6} {:>7}  {}/{}  {}{}\n",
                point.timestamp().format("%Y-%m-%d %H:%M:%S"),
                point.latitude(),
                point.longitude(),
                point.source_type().to_string(),
                point.confidence_level().to_string(),
                precision,
                point.origin(),
                point.provider(),
                point.raw_reference(),
                inferred
            ));
        }
    }

    output
}

/// Plain-text rendering of the audit trail.
pub fn generate_audit_summary(trail: &AuditTrail) -> String {
    let mut output = String::new();

    output.push_str(&format!("Run:              {}\n", trail.run_id));
    output.push_str(&format!(
        "Extracted at:     {}\n",
        trail.extracted_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "External lookup:  {}\n\n",
        if trail.external_lookup_enabled {
            "enabled"
        } else {
            "disabled"
        }
    ));

    for entry in &trail.audit_log {
        let time = entry.timestamp.format("%H:%M:%S%.3f");
        match &entry.event {
            AuditEvent::Collector(o) => {
                let detail = match o.status {
                    CollectorStatus::Success => format!(
                        "{} points in {}ms",
                        o.points_collected.unwrap_or(0),
                        o.duration_ms.unwrap_or(0)
                    ),
                    CollectorStatus::Skipped => o.reason.clone().unwrap_or_default(),
                    CollectorStatus::Error => o.error.clone().unwrap_or_default(),
                };
                output.push_str(&format!(
                    "  {}  {:<13} {:<8} {}\n",
                    time,
                    o.collector,
                    o.status.to_string(),
                    detail
                ));
            }
            AuditEvent::Milestone(m) => {
                let detail = match m.action {
                    PipelineAction::CollectionStarted => {
                        format!("{} collectors", m.collectors.unwrap_or(0))
                    }
                    PipelineAction::CollectionCompleted => format!(
                        "{} raw, {} unique, {} duplicates removed",
                        m.raw_points.unwrap_or(0),
                        m.unique_points.unwrap_or(0),
                        m.duplicates_removed.unwrap_or(0)
                    ),
                };
                output.push_str(&format!("  {}  {} ({})\n", time, m.action, detail));
            }
        }
    }

    output
}

/// Short confirmation printed after a collection run.
pub fn generate_collection_summary(snapshot: &Snapshot) -> String {
    let mut counts = [0usize; 3];
    let mut duplicates_removed = 0;
    for entry in &snapshot.audit_log {
        if let Some(m) = entry.as_milestone() {
            duplicates_removed = m.duplicates_removed.unwrap_or(duplicates_removed);
        }
        if let Some(o) = entry.as_collector() {
            let slot = match o.status {
                CollectorStatus::Success => 0,
                CollectorStatus::Skipped => 1,
                CollectorStatus::Error => 2,
            };
            counts[slot] += 1;
        }
    }

    format!(
        "   Points: {} ({} duplicates removed)\n   Collectors: {} succeeded | {} skipped | {} failed\n",
        snapshot.points.len(),
        duplicates_removed,
        counts[0],
        counts[1],
        counts[2]
    )
}
