//! Logcat location collector.
//!
//! Scans captured logcat output for `Location[...]` records printed by the
//! framework. This is direct device telemetry, so points are never inferred.

use super::patterns::{self, LOCATION_BRACKET};
use super::{Artifact, Collector};
use crate::models::{LocationPoint, RetentionEstimate, SourceType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct LogcatCollector {
    files: Vec<Artifact>,
}

impl LogcatCollector {
    pub fn new(dir: &std::path::Path, file_names: &[String]) -> Self {
        Self {
            files: file_names.iter().map(|f| Artifact::new(dir, f)).collect(),
        }
    }

    fn parse_line(
        &self,
        artifact: &Artifact,
        line_number: usize,
        line: &str,
        now: DateTime<Utc>,
    ) -> Option<LocationPoint> {
        let caps = LOCATION_BRACKET.captures(line)?;
        let provider = caps.get(1)?.as_str();
        let latitude = patterns::parse_f64(caps.get(2)?.as_str())?;
        let longitude = patterns::parse_f64(caps.get(3)?.as_str())?;

        let (timestamp, timestamp_source) = match patterns::time_millis(line) {
            Some(ts) => (ts, "line"),
            None => match patterns::threadtime(line, now) {
                Some(ts) => (ts, "line"),
                None => (now, "collection_time"),
            },
        };

        let mut builder = LocationPoint::builder(SourceType::from_provider(provider), self.name())
            .position(latitude, longitude)
            .timestamp(timestamp)
            .provider(provider)
            .raw_reference(artifact.reference(line_number))
            .precision(patterns::accuracy(line))
            .retention(self.retention_estimate())
            .metadata("timestamp_source", timestamp_source);

        if let Some(tag) = patterns::log_tag(line) {
            builder = builder.device_context("log_tag", tag);
        }

        match builder.build_at(now) {
            Ok(point) => Some(point),
            Err(e) => {
                debug!("Skipping {}: {}", artifact.reference(line_number), e);
                None
            }
        }
    }
}

impl Collector for LogcatCollector {
    fn name(&self) -> &str {
        "logcat"
    }

    fn can_run(&self) -> bool {
        self.files.iter().any(Artifact::exists)
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        // ring buffer rotates within hours on a busy device
        RetentionEstimate::Hours
    }

    fn collect(&self) -> Result<Vec<LocationPoint>> {
        let now = Utc::now();
        let mut points = Vec::new();

        for artifact in self.files.iter().filter(|a| a.exists()) {
            let lines = artifact.read_lines()?;
            let before = points.len();

            for (index, line) in lines.iter().enumerate() {
                if let Some(point) = self.parse_line(artifact, index + 1, line, now) {
                    points.push(point);
                }
            }

            debug!(
                "{}: {} location records",
                artifact.file_name(),
                points.len() - before
            );
        }

        Ok(points)
    }

    fn skip_reason(&self) -> String {
        let names: Vec<_> = self.files.iter().map(|a| a.file_name()).collect();
        format!("no logcat capture found (looked for {})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfidenceLevel;
    use tempfile::TempDir;

    fn collector_with(content: &str) -> (TempDir, LogcatCollector) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("logcat_location.txt"), content).unwrap();
        let collector = LogcatCollector::new(
            temp_dir.path(),
            &["logcat_location.txt".to_string(), "logcat.txt".to_string()],
        );
        (temp_dir, collector)
    }

    #[test]
    fn test_gps_fix_from_location_record() {
        let (_dir, collector) =
            collector_with("Location[gps 37.42190,-122.08400 acc=5.0 time=1700000000000]\n");

        assert!(collector.can_run());
        let points = collector.collect().unwrap();

        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.source_type(), SourceType::Gps);
        assert_eq!(point.precision_meters(), Some(5.0));
        assert_eq!(point.timestamp_unix(), 1_700_000_000);
        assert!(!point.is_inferred());
        assert!(point.confidence_score() >= 70.0);
        assert_eq!(point.confidence_level(), ConfidenceLevel::High);
        assert_eq!(point.raw_reference(), "logcat_location.txt:1");
        assert_eq!(point.origin(), "logcat");
    }

    #[test]
    fn test_provider_mapping_and_bad_lines_skipped() {
        let content = "\
01-15 10:30:45.123  1000  1200 D LocationManagerService: Location[network 40.71280,-74.00600 acc=30 time=1700000100000]
garbage line
Location[passive 0.0,0.0 acc=1 time=1700000200000]
Location[fused 95.0,10.0 acc=3 time=1700000300000]
Location[fused 51.50740,-0.12780 acc=3]
";
        let (_dir, collector) = collector_with(content);
        let points = collector.collect().unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].source_type(), SourceType::Network);
        assert_eq!(
            points[0].device_context().get("log_tag").and_then(|v| v.as_str()),
            Some("LocationManagerService")
        );
        assert_eq!(points[1].source_type(), SourceType::Fused);
        assert_eq!(points[1].raw_reference(), "logcat_location.txt:5");
        assert_eq!(
            points[1].metadata().get("timestamp_source").and_then(|v| v.as_str()),
            Some("collection_time")
        );
    }

    #[test]
    fn test_threadtime_prefix_counts_as_line_timestamp() {
        let (_dir, collector) = collector_with(
            "01-15 10:30:45.123  1000  1200 D GnssLocationProvider: Location[gps 48.85660,2.35220 acc=4]\n",
        );
        let points = collector.collect().unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].metadata().get("timestamp_source").and_then(|v| v.as_str()),
            Some("line")
        );
        assert!(points[0].timestamp() <= Utc::now());
    }

    #[test]
    fn test_reads_both_capture_files() {
        let (dir, collector) = collector_with("Location[gps 10.5,20.5 time=1700000000000]\n");
        std::fs::write(
            dir.path().join("logcat.txt"),
            "Location[network 11.5,21.5 time=1700000000000]\n",
        )
        .unwrap();

        let points = collector.collect().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].raw_reference(), "logcat.txt:1");
    }

    #[test]
    fn test_cannot_run_without_capture() {
        let temp_dir = TempDir::new().unwrap();
        let collector = LogcatCollector::new(temp_dir.path(), &["logcat.txt".to_string()]);
        assert!(!collector.can_run());
        assert!(collector.skip_reason().contains("logcat.txt"));
    }
}
