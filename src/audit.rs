//! Append-only audit trail for collection runs.
//!
//! Each collector outcome and pipeline milestone becomes one
//! [`AuditLogEntry`]. Entries are written through an [`AuditSink`] handed to
//! the aggregator, and every recorded entry is mirrored to `tracing` so a run
//! that dies before persisting still leaves a trail in the logs.

use crate::models::RetentionEstimate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Outcome of running one collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorStatus {
    Success,
    Skipped,
    Error,
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorStatus::Success => write!(f, "success"),
            CollectorStatus::Skipped => write!(f, "skipped"),
            CollectorStatus::Error => write!(f, "error"),
        }
    }
}

/// Pipeline-level milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineAction {
    CollectionStarted,
    CollectionCompleted,
}

impl fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineAction::CollectionStarted => write!(f, "collection_started"),
            PipelineAction::CollectionCompleted => write!(f, "collection_completed"),
        }
    }
}

/// What a single collector did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorOutcome {
    pub collector: String,
    pub status: CollectorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_collected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_estimate: Option<RetentionEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A pipeline start/finish marker with its counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMilestone {
    pub action: PipelineAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_lookup_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collectors: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicates_removed: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditEvent {
    Collector(CollectorOutcome),
    Milestone(PipelineMilestone),
}

/// One timestamped audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditLogEntry {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Collector ran and produced points.
    pub fn success(
        collector: &str,
        points_collected: usize,
        duration_ms: u64,
        retention: RetentionEstimate,
    ) -> Self {
        Self::now(AuditEvent::Collector(CollectorOutcome {
            collector: collector.to_string(),
            status: CollectorStatus::Success,
            points_collected: Some(points_collected),
            duration_ms: Some(duration_ms),
            retention_estimate: Some(retention),
            reason: None,
            error: None,
        }))
    }

    /// Collector could not run.
    pub fn skipped(collector: &str, reason: impl Into<String>) -> Self {
        Self::now(AuditEvent::Collector(CollectorOutcome {
            collector: collector.to_string(),
            status: CollectorStatus::Skipped,
            points_collected: None,
            duration_ms: None,
            retention_estimate: None,
            reason: Some(reason.into()),
            error: None,
        }))
    }

    /// Collector failed while collecting.
    pub fn failed(collector: &str, error: impl Into<String>, duration_ms: u64) -> Self {
        Self::now(AuditEvent::Collector(CollectorOutcome {
            collector: collector.to_string(),
            status: CollectorStatus::Error,
            points_collected: None,
            duration_ms: Some(duration_ms),
            retention_estimate: None,
            reason: None,
            error: Some(error.into()),
        }))
    }

    pub fn collection_started(external_lookup_enabled: bool, collectors: usize) -> Self {
        Self::now(AuditEvent::Milestone(PipelineMilestone {
            action: PipelineAction::CollectionStarted,
            external_lookup_enabled: Some(external_lookup_enabled),
            collectors: Some(collectors),
            raw_points: None,
            unique_points: None,
            duplicates_removed: None,
        }))
    }

    pub fn collection_completed(raw_points: usize, unique_points: usize) -> Self {
        Self::now(AuditEvent::Milestone(PipelineMilestone {
            action: PipelineAction::CollectionCompleted,
            external_lookup_enabled: None,
            collectors: None,
            raw_points: Some(raw_points),
            unique_points: Some(unique_points),
            duplicates_removed: Some(raw_points.saturating_sub(unique_points)),
        }))
    }

    /// Collector outcome, if this entry is one.
    pub fn as_collector(&self) -> Option<&CollectorOutcome> {
        match &self.event {
            AuditEvent::Collector(outcome) => Some(outcome),
            AuditEvent::Milestone(_) => None,
        }
    }

    /// Milestone, if this entry is one.
    pub fn as_milestone(&self) -> Option<&PipelineMilestone> {
        match &self.event {
            AuditEvent::Milestone(milestone) => Some(milestone),
            AuditEvent::Collector(_) => None,
        }
    }
}

/// Destination for audit entries.
pub trait AuditSink {
    fn record(&mut self, entry: AuditLogEntry);
}

/// In-memory, insertion-ordered audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditLogEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_entries(self) -> Vec<AuditLogEntry> {
        self.entries
    }
}

impl AuditSink for AuditLog {
    fn record(&mut self, entry: AuditLogEntry) {
        trace_entry(&entry);
        self.entries.push(entry);
    }
}

fn trace_entry(entry: &AuditLogEntry) {
    match &entry.event {
        AuditEvent::Collector(o) => match o.status {
            CollectorStatus::Success => info!(
                "[audit] {}: success, {} points in {}ms",
                o.collector,
                o.points_collected.unwrap_or(0),
                o.duration_ms.unwrap_or(0)
            ),
            CollectorStatus::Skipped => warn!(
                "[audit] {}: skipped ({})",
                o.collector,
                o.reason.as_deref().unwrap_or("no reason given")
            ),
            CollectorStatus::Error => error!(
                "[audit] {}: error ({})",
                o.collector,
                o.error.as_deref().unwrap_or("unknown error")
            ),
        },
        AuditEvent::Milestone(m) => match m.action {
            PipelineAction::CollectionStarted => info!(
                "[audit] collection_started (external lookup: {})",
                m.external_lookup_enabled.unwrap_or(false)
            ),
            PipelineAction::CollectionCompleted => info!(
                "[audit] collection_completed: {} raw, {} unique, {} duplicates removed",
                m.raw_points.unwrap_or(0),
                m.unique_points.unwrap_or(0),
                m.duplicates_removed.unwrap_or(0)
            ),
        },
    }
}
