//! Application log collector.
//!
//! Opportunistic extraction of latitude/longitude pairs that apps write to
//! their own logs. Both coordinates must appear on the same line; a lone
//! latitude is never completed from surrounding context. The points are
//! direct observations but low-trust, which the score reflects.

use super::patterns;
use super::{Artifact, Collector};
use crate::models::{LocationPoint, RetentionEstimate, SourceType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static LATITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?\blat(?:itude)?"?\s*[=:]\s*"?(-?\d+(?:\.\d+)?)"#).unwrap()
});

static LONGITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?\b(?:lng|lon|long|longitude)"?\s*[=:]\s*"?(-?\d+(?:\.\d+)?)"#).unwrap()
});

static PACKAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:package|pkg|app)"?\s*[=:]\s*"?([a-z][\w]*(?:\.[\w]+)+)"#).unwrap()
});

fn capture_f64(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| patterns::parse_f64(m.as_str()))
}

pub struct AppLocationCollector {
    artifact: Artifact,
}

impl AppLocationCollector {
    pub fn new(dir: &std::path::Path, file_name: &str) -> Self {
        Self {
            artifact: Artifact::new(dir, file_name),
        }
    }

    fn parse_line(&self, line_number: usize, line: &str, now: DateTime<Utc>) -> Option<LocationPoint> {
        let latitude = capture_f64(&LATITUDE, line)?;
        let longitude = capture_f64(&LONGITUDE, line)?;

        let (timestamp, timestamp_source) = match patterns::embedded_timestamp(line) {
            Some(ts) => (ts, "line"),
            None => (now, "collection_time"),
        };

        let package = PACKAGE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let mut builder = LocationPoint::builder(SourceType::App, self.name())
            .position(latitude, longitude)
            .timestamp(timestamp)
            .provider(package.clone().unwrap_or_else(|| "app_log".to_string()))
            .raw_reference(self.artifact.reference(line_number))
            .precision(patterns::accuracy(line))
            .retention(self.retention_estimate())
            .metadata("timestamp_source", timestamp_source);

        if let Some(package) = package {
            builder = builder.device_context("package", package);
        }

        match builder.build_at(now) {
            Ok(point) => Some(point),
            Err(e) => {
                debug!("Skipping {}: {}", self.artifact.reference(line_number), e);
                None
            }
        }
    }
}

impl Collector for AppLocationCollector {
    fn name(&self) -> &str {
        "app_location"
    }

    fn can_run(&self) -> bool {
        self.artifact.exists()
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        // app-private logs tend to survive until the app rotates them
        RetentionEstimate::Days
    }

    fn collect(&self) -> Result<Vec<LocationPoint>> {
        let now = Utc::now();
        let lines = self.artifact.read_lines()?;

        Ok(lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| self.parse_line(index + 1, line, now))
            .collect())
    }

    fn skip_reason(&self) -> String {
        format!("{} not found", self.artifact.file_name())
    }
}
