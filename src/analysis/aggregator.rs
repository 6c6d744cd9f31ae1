//! Collector orchestration, de-duplication and ordering.
//!
//! The aggregator runs every collector in priority order under a fail-open
//! policy: a collector that is missing its artifact is skipped, one that
//! fails or panics is recorded as an error, and neither stops the rest.
//! The combined points are then de-duplicated per space/time bucket and
//! sorted oldest first.

use crate::audit::{AuditLog, AuditLogEntry, AuditSink};
use crate::collectors::{self, Collector, LookupOptions};
use crate::config::ArtifactsConfig;
use crate::models::LocationPoint;
use anyhow::{bail, Result};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Width of a de-duplication time bucket, in seconds.
pub const DEDUP_BUCKET_SECONDS: i64 = 30;

/// Points plus the audit trail of the run that produced them.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub points: Vec<LocationPoint>,
    pub audit_log: Vec<AuditLogEntry>,
}

pub struct Aggregator {
    collectors: Vec<Box<dyn Collector>>,
    external_lookup: bool,
}

impl Aggregator {
    /// Aggregator over an explicit, already ordered collector list.
    pub fn new(collectors: Vec<Box<dyn Collector>>, external_lookup: bool) -> Self {
        Self {
            collectors,
            external_lookup,
        }
    }

    /// Aggregator over the standard collectors reading from `dir`.
    pub fn from_artifacts(
        artifacts: &ArtifactsConfig,
        dir: &Path,
        options: LookupOptions,
    ) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Artifact directory not found: {}", dir.display());
        }

        let external_lookup = options.external_lookup;
        let collectors = collectors::default_collectors(artifacts, dir, &options);
        Ok(Self::new(collectors, external_lookup))
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run the full pipeline with a fresh in-memory audit log.
    pub fn run(&self) -> AggregationResult {
        let mut audit = AuditLog::new();
        let points = self.collect_all(&mut audit);
        AggregationResult {
            points,
            audit_log: audit.into_entries(),
        }
    }

    /// Run every collector, recording each outcome into `audit`.
    pub fn collect_all(&self, audit: &mut dyn AuditSink) -> Vec<LocationPoint> {
        audit.record(AuditLogEntry::collection_started(
            self.external_lookup,
            self.collectors.len(),
        ));

        let mut all_points = Vec::new();

        for collector in &self.collectors {
            let name = collector.name();

            if !collector.can_run() {
                audit.record(AuditLogEntry::skipped(name, collector.skip_reason()));
                continue;
            }

            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| collector.collect()));
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(points)) => {
                    audit.record(AuditLogEntry::success(
                        name,
                        points.len(),
                        elapsed_ms,
                        collector.retention_estimate(),
                    ));
                    all_points.extend(points);
                }
                Ok(Err(e)) => {
                    audit.record(AuditLogEntry::failed(name, format!("{:#}", e), elapsed_ms));
                }
                Err(payload) => {
                    audit.record(AuditLogEntry::failed(
                        name,
                        format!("collector panicked: {}", panic_message(&payload)),
                        elapsed_ms,
                    ));
                }
            }
        }

        let raw_count = all_points.len();
        let mut points = deduplicate(all_points);
        sort_chronologically(&mut points);

        debug!("{} raw points, {} after de-duplication", raw_count, points.len());
        audit.record(AuditLogEntry::collection_completed(raw_count, points.len()));

        points
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Space/time bucket: coordinates at 5 decimals (about 1 m) and a 30 s window.
pub fn bucket_key(point: &LocationPoint) -> (i64, i64, i64) {
    (
        (point.latitude() * 100_000.0).round() as i64,
        (point.longitude() * 100_000.0).round() as i64,
        point.timestamp_unix().div_euclid(DEDUP_BUCKET_SECONDS),
    )
}

/// Collapse points sharing a bucket, keeping the most confident one.
///
/// A later point replaces the kept one only with a strictly higher score,
/// so exact ties go to the first point seen.
pub fn deduplicate(points: Vec<LocationPoint>) -> Vec<LocationPoint> {
    let mut index: HashMap<(i64, i64, i64), usize> = HashMap::new();
    let mut kept: Vec<LocationPoint> = Vec::with_capacity(points.len());

    for point in points {
        let key = bucket_key(&point);
        match index.get(&key) {
            Some(&slot) => {
                if point.confidence_score() > kept[slot].confidence_score() {
                    kept[slot] = point;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(point);
            }
        }
    }

    kept
}

/// Oldest first; equal timestamps keep their relative order.
pub fn sort_chronologically(points: &mut [LocationPoint]) {
    points.sort_by_key(|p| p.timestamp_unix());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{CollectorStatus, PipelineAction};
    use crate::models::{RetentionEstimate, SourceType};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn point(source: SourceType, lat: f64, lon: f64, ts: i64, precision: Option<f64>) -> LocationPoint {
        LocationPoint::builder(source, "test")
            .position(lat, lon)
            .timestamp(Utc.timestamp_opt(ts, 0).unwrap())
            .provider("test")
            .raw_reference("test.txt:1")
            .precision(precision)
            .build_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .unwrap()
    }

    struct FixedCollector {
        name: &'static str,
        points: Vec<LocationPoint>,
        ran: Arc<AtomicBool>,
    }

    impl FixedCollector {
        fn boxed(name: &'static str, points: Vec<LocationPoint>) -> (Box<dyn Collector>, Arc<AtomicBool>) {
            let ran = Arc::new(AtomicBool::new(false));
            let collector = Self {
                name,
                points,
                ran: ran.clone(),
            };
            (Box::new(collector), ran)
        }
    }

    impl Collector for FixedCollector {
        fn name(&self) -> &str {
            self.name
        }
        fn can_run(&self) -> bool {
            true
        }
        fn retention_estimate(&self) -> RetentionEstimate {
            RetentionEstimate::Hours
        }
        fn collect(&self) -> Result<Vec<LocationPoint>> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(self.points.clone())
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn name(&self) -> &str {
            "failing"
        }
        fn can_run(&self) -> bool {
            true
        }
        fn retention_estimate(&self) -> RetentionEstimate {
            RetentionEstimate::Unknown
        }
        fn collect(&self) -> Result<Vec<LocationPoint>> {
            bail!("artifact truncated")
        }
    }

    struct PanickingCollector;

    impl Collector for PanickingCollector {
        fn name(&self) -> &str {
            "panicking"
        }
        fn can_run(&self) -> bool {
            true
        }
        fn retention_estimate(&self) -> RetentionEstimate {
            RetentionEstimate::Unknown
        }
        fn collect(&self) -> Result<Vec<LocationPoint>> {
            panic!("index out of bounds")
        }
    }

    struct AbsentCollector;

    impl Collector for AbsentCollector {
        fn name(&self) -> &str {
            "absent"
        }
        fn can_run(&self) -> bool {
            false
        }
        fn retention_estimate(&self) -> RetentionEstimate {
            RetentionEstimate::Unknown
        }
        fn collect(&self) -> Result<Vec<LocationPoint>> {
            panic!("must not be called when can_run is false")
        }
    }

    #[test]
    fn test_fail_open() {
        let (first, first_ran) =
            FixedCollector::boxed("first", vec![point(SourceType::Gps, 10.0, 10.0, 1_000, None)]);
        let (last, last_ran) =
            FixedCollector::boxed("last", vec![point(SourceType::App, 20.0, 20.0, 2_000, None)]);

        let aggregator = Aggregator::new(
            vec![
                first,
                Box::new(FailingCollector),
                Box::new(PanickingCollector),
                Box::new(AbsentCollector),
                last,
            ],
            false,
        );

        let result = aggregator.run();

        assert!(first_ran.load(Ordering::SeqCst));
        assert!(last_ran.load(Ordering::SeqCst));
        assert_eq!(result.points.len(), 2);

        let outcomes: Vec<_> = result
            .audit_log
            .iter()
            .filter_map(|e| e.as_collector())
            .map(|o| (o.collector.as_str(), o.status))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("first", CollectorStatus::Success),
                ("failing", CollectorStatus::Error),
                ("panicking", CollectorStatus::Error),
                ("absent", CollectorStatus::Skipped),
                ("last", CollectorStatus::Success),
            ]
        );

        let failing = result.audit_log[2].as_collector().unwrap();
        assert_eq!(failing.error.as_deref(), Some("artifact truncated"));
        let panicking = result.audit_log[3].as_collector().unwrap();
        assert!(panicking.error.as_deref().unwrap().contains("index out of bounds"));
    }

    #[test]
    fn test_audit_milestones() {
        let (a, _) = FixedCollector::boxed(
            "a",
            vec![
                point(SourceType::Gps, 10.0, 10.0, 1_000, None),
                point(SourceType::Gps, 10.0, 10.0, 1_001, None),
            ],
        );
        let result = Aggregator::new(vec![a], true).run();

        let first = result.audit_log.first().unwrap().as_milestone().unwrap();
        assert_eq!(first.action, PipelineAction::CollectionStarted);
        assert_eq!(first.external_lookup_enabled, Some(true));

        let last = result.audit_log.last().unwrap().as_milestone().unwrap();
        assert_eq!(last.action, PipelineAction::CollectionCompleted);
        assert_eq!(last.raw_points, Some(2));
        assert_eq!(last.unique_points, Some(1));
        assert_eq!(last.duplicates_removed, Some(1));

        let success = result.audit_log[1].as_collector().unwrap();
        assert_eq!(success.points_collected, Some(2));
        assert_eq!(success.retention_estimate, Some(RetentionEstimate::Hours));
    }

    #[test]
    fn test_dedup_keeps_higher_confidence_across_collectors() {
        let gps = point(SourceType::Gps, 37.42190, -122.08400, 1_700_000_000, Some(5.0));
        let network = point(SourceType::Network, 37.42190, -122.08400, 1_700_000_005, None);
        assert!(gps.confidence_score() > network.confidence_score());

        let (a, _) = FixedCollector::boxed("network_first", vec![network.clone()]);
        let (b, _) = FixedCollector::boxed("gps_second", vec![gps.clone()]);
        let result = Aggregator::new(vec![a, b], false).run();

        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].id(), gps.id());
        assert_eq!(result.points[0].source_type(), SourceType::Gps);
    }

    #[test]
    fn test_dedup_tie_keeps_first() {
        let first = point(SourceType::Gps, 1.0, 1.0, 60, None);
        let second = point(SourceType::Gps, 1.0, 1.0, 61, None);

        let kept = deduplicate(vec![first.clone(), second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), first.id());
    }

    #[test]
    fn test_dedup_separates_buckets() {
        let points = vec![
            point(SourceType::Gps, 1.0, 1.0, 59, None),
            point(SourceType::Gps, 1.0, 1.0, 60, None),
            point(SourceType::Gps, 1.00002, 1.0, 60, None),
        ];
        assert_eq!(deduplicate(points).len(), 3);
    }

    #[test]
    fn test_dedup_idempotent_and_order_independent() {
        let points = vec![
            point(SourceType::App, 5.0, 5.0, 100, None),
            point(SourceType::Gps, 5.0, 5.0, 105, Some(10.0)),
            point(SourceType::Network, 5.0, 5.0, 110, Some(100.0)),
            point(SourceType::Network, 6.0, 6.0, 500, None),
        ];

        let once = deduplicate(points.clone());
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);

        let mut reversed = points;
        reversed.reverse();
        let from_reversed = deduplicate(reversed);

        let ids = |v: &[LocationPoint]| v.iter().map(|p| p.id()).collect::<HashSet<_>>();
        assert_eq!(ids(&once), ids(&from_reversed));
        assert!(once.iter().any(|p| p.source_type() == SourceType::Gps));
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_sorted_oldest_first_and_stable() {
        let a = point(SourceType::Gps, 1.0, 1.0, 300, None);
        let b = point(SourceType::Gps, 2.0, 2.0, 100, None);
        let c = point(SourceType::Gps, 3.0, 3.0, 300, None);

        let mut points = vec![a.clone(), b.clone(), c.clone()];
        sort_chronologically(&mut points);

        let ids: Vec<_> = points.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id(), c.id()]);
    }

    #[test]
    fn test_from_artifacts_requires_directory() {
        let result = Aggregator::from_artifacts(
            &ArtifactsConfig::default(),
            Path::new("/definitely/not/here"),
            LookupOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_end_to_end_fixture_artifacts() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/artifacts");
        let aggregator =
            Aggregator::from_artifacts(&ArtifactsConfig::default(), &dir, LookupOptions::default())
                .unwrap();

        let result = aggregator.run();

        assert!(!result.points.is_empty());
        assert!(result.points.iter().all(|p| !p.is_inferred()));
        assert!(result
            .points
            .windows(2)
            .all(|w| w[0].timestamp_unix() <= w[1].timestamp_unix()));

        let statuses: HashMap<_, _> = result
            .audit_log
            .iter()
            .filter_map(|e| e.as_collector())
            .map(|o| (o.collector.clone(), o.status))
            .collect();
        assert_eq!(statuses["logcat"], CollectorStatus::Success);
        assert_eq!(statuses["dumpsys"], CollectorStatus::Success);
        assert_eq!(statuses["cell_tower"], CollectorStatus::Success);
        assert_eq!(statuses["wifi"], CollectorStatus::Success);
        assert_eq!(statuses["app_location"], CollectorStatus::Success);
        assert_eq!(statuses["root"], CollectorStatus::Skipped);

        // cell and wifi produce nothing without an explicit lookup
        let cell = result
            .audit_log
            .iter()
            .filter_map(|e| e.as_collector())
            .find(|o| o.collector == "cell_tower")
            .unwrap();
        assert_eq!(cell.points_collected, Some(0));
    }
}
