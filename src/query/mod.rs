//! Read-side filtering over a persisted snapshot.

use crate::models::{ConfidenceLevel, LocationPoint, SourceType};
use chrono::SecondsFormat;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Filter applied to the snapshot points. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Inclusive lower bound on `timestamp_unix`.
    pub start_unix: Option<i64>,
    /// Inclusive upper bound on `timestamp_unix`.
    pub end_unix: Option<i64>,
    pub sources: Option<HashSet<SourceType>>,
    pub min_confidence: Option<ConfidenceLevel>,
}

impl QueryFilter {
    pub fn matches(&self, point: &LocationPoint) -> bool {
        let ts = point.timestamp_unix();

        if self.start_unix.is_some_and(|start| ts < start) {
            return false;
        }
        if self.end_unix.is_some_and(|end| ts > end) {
            return false;
        }
        if let Some(ref sources) = self.sources {
            if !sources.contains(&point.source_type()) {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if point.confidence_level().ordinal() < min.ordinal() {
                return false;
            }
        }

        true
    }
}

/// Earliest and latest timestamps in a result, RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub total_points: usize,
    pub time_range: TimeRange,
    pub source_breakdown: BTreeMap<SourceType, usize>,
    pub confidence_breakdown: BTreeMap<ConfidenceLevel, usize>,
    pub locations: Vec<LocationPoint>,
}

/// Apply `filter` to `points`, computing the breakdowns in the same pass.
pub fn run_query(points: &[LocationPoint], filter: &QueryFilter) -> QueryResult {
    let mut source_breakdown = BTreeMap::new();
    let mut confidence_breakdown: BTreeMap<ConfidenceLevel, usize> = [
        (ConfidenceLevel::High, 0),
        (ConfidenceLevel::Medium, 0),
        (ConfidenceLevel::Low, 0),
    ]
    .into_iter()
    .collect();

    let mut earliest: Option<&LocationPoint> = None;
    let mut latest: Option<&LocationPoint> = None;
    let mut locations = Vec::new();

    for point in points.iter().filter(|p| filter.matches(p)) {
        *source_breakdown.entry(point.source_type()).or_insert(0) += 1;
        *confidence_breakdown
            .entry(point.confidence_level())
            .or_insert(0) += 1;

        if earliest.map_or(true, |e| point.timestamp_unix() < e.timestamp_unix()) {
            earliest = Some(point);
        }
        if latest.map_or(true, |l| point.timestamp_unix() > l.timestamp_unix()) {
            latest = Some(point);
        }

        locations.push(point.clone());
    }

    let format = |p: &LocationPoint| p.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true);

    QueryResult {
        total_points: locations.len(),
        time_range: TimeRange {
            earliest: earliest.map(format),
            latest: latest.map(format),
        },
        source_breakdown,
        confidence_breakdown,
        locations,
    }
}
