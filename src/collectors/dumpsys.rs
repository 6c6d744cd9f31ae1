//! `dumpsys location` collector.
//!
//! The location service dump prints fixes in several shapes depending on the
//! Android release. Three patterns are tried per line, most specific first:
//! the `Location[...]` bracket form, a "Last Known Location" prefixed form,
//! and a loose `lat=... lon=...` free-text form.

use super::patterns::{self, LOCATION_BRACKET};
use super::{Artifact, Collector};
use crate::models::{LocationPoint, RetentionEstimate, SourceType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static LAST_KNOWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)last\s+known\s+locations?(?:\s+for\s+([a-z]+))?[^:]*:\s*(?:([a-z]+)\s+)?(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)",
    )
    .unwrap()
});

static FREE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\blat(?:itude)?\s*[=:]\s*(-?\d+(?:\.\d+)?)[\s,;]+(?:lng|lon|long|longitude)\s*[=:]\s*(-?\d+(?:\.\d+)?)",
    )
    .unwrap()
});

static PROVIDER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bprovider\s*[=:]\s*([a-z]+)").unwrap());

/// A coordinate pair pulled out of one line.
#[derive(Debug, Clone, PartialEq)]
struct Match {
    pattern: &'static str,
    provider: String,
    latitude: f64,
    longitude: f64,
}

fn match_line(line: &str) -> Option<Match> {
    if let Some(caps) = LOCATION_BRACKET.captures(line) {
        return Some(Match {
            pattern: "bracket",
            provider: caps[1].to_string(),
            latitude: patterns::parse_f64(&caps[2])?,
            longitude: patterns::parse_f64(&caps[3])?,
        });
    }

    if let Some(caps) = LAST_KNOWN.captures(line) {
        let provider = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .or_else(|| provider_field(line))
            .unwrap_or_else(|| "unknown".to_string());
        return Some(Match {
            pattern: "last_known",
            provider,
            latitude: patterns::parse_f64(&caps[3])?,
            longitude: patterns::parse_f64(&caps[4])?,
        });
    }

    let caps = FREE_TEXT.captures(line)?;
    Some(Match {
        pattern: "free_text",
        provider: provider_field(line).unwrap_or_else(|| "unknown".to_string()),
        latitude: patterns::parse_f64(&caps[1])?,
        longitude: patterns::parse_f64(&caps[2])?,
    })
}

fn provider_field(line: &str) -> Option<String> {
    PROVIDER_FIELD
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct DumpsysCollector {
    artifact: Artifact,
}

impl DumpsysCollector {
    pub fn new(dir: &std::path::Path, file_name: &str) -> Self {
        Self {
            artifact: Artifact::new(dir, file_name),
        }
    }

    fn parse_line(&self, line_number: usize, line: &str, now: DateTime<Utc>) -> Option<LocationPoint> {
        let found = match_line(line)?;

        let (timestamp, timestamp_source) = match patterns::time_millis(line) {
            Some(ts) => (ts, "line"),
            None => (now, "collection_time"),
        };

        let result = LocationPoint::builder(SourceType::from_provider(&found.provider), self.name())
            .position(found.latitude, found.longitude)
            .timestamp(timestamp)
            .provider(found.provider)
            .raw_reference(self.artifact.reference(line_number))
            .precision(patterns::accuracy(line))
            .retention(self.retention_estimate())
            .metadata("pattern", found.pattern)
            .metadata("timestamp_source", timestamp_source)
            .build_at(now);

        match result {
            Ok(point) => Some(point),
            Err(e) => {
                debug!("Skipping {}: {}", self.artifact.reference(line_number), e);
                None
            }
        }
    }
}

impl Collector for DumpsysCollector {
    fn name(&self) -> &str {
        "dumpsys"
    }

    fn can_run(&self) -> bool {
        self.artifact.exists()
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        // last-known fixes are replaced as soon as a provider reports again
        RetentionEstimate::Minutes
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_precedence() {
        let bracket = match_line("  gps: Location[gps 37.4,-122.0 hAcc=20] lat=1.0 lon=2.0").unwrap();
        assert_eq!(bracket.pattern, "bracket");
        assert_eq!(bracket.latitude, 37.4);

        let last_known = match_line("Last Known Location: network 48.8566, 2.3522").unwrap();
        assert_eq!(last_known.pattern, "last_known");
        assert_eq!(last_known.provider, "network");
        assert_eq!(last_known.longitude, 2.3522);

        let free = match_line("fix provider=gps latitude: 35.6762, longitude: 139.6503").unwrap();
        assert_eq!(free.pattern, "free_text");
        assert_eq!(free.provider, "gps");
        assert_eq!(free.latitude, 35.6762);

        assert!(match_line("Last Known Locations:").is_none());
        assert!(match_line("lat=12.0 only").is_none());
    }

    #[test]
    fn test_collect_dump() {
        let temp_dir = TempDir::new().unwrap();
        let dump = "\
Location Manager State:
  Last Known Locations:
    gps: Location[gps 37.42199,-122.08400 hAcc=12 et=+1d2h time=1700000000000]
    network: Location[network 37.42250,-122.08500 acc=800 time=1700000060000]
    passive: Location[passive 999.0,-122.08500 acc=800]
  Last Known Location for fused: 37.42000, -122.08000 accuracy=40
  debug lat=52.52 lon=13.405 provider=network
";
        std::fs::write(temp_dir.path().join("dumpsys_location.txt"), dump).unwrap();
        let collector = DumpsysCollector::new(temp_dir.path(), "dumpsys_location.txt");

        let points = collector.collect().unwrap();
        assert_eq!(points.len(), 4);

        assert_eq!(points[0].source_type(), SourceType::Gps);
        assert_eq!(points[0].precision_meters(), Some(12.0));
        assert_eq!(points[1].precision_meters(), Some(800.0));
        assert_eq!(points[2].source_type(), SourceType::Fused);
        assert_eq!(points[2].metadata().get("pattern").unwrap(), "last_known");
        assert_eq!(points[3].source_type(), SourceType::Network);
        assert_eq!(points[3].raw_reference(), "dumpsys_location.txt:7");
        assert!(points.iter().all(|p| !p.is_inferred()));
    }
}
