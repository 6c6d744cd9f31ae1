//! Wi-Fi scan collector.
//!
//! Reads BSSID/SSID/signal triples from a `dumpsys wifi` scan dump and keeps
//! the strongest few. Like cell towers, access points only become a position
//! through an explicitly enabled external lookup, and such points are always
//! flagged as inferred.

use super::geolocate::{WIFI_INFERENCE_METHOD, WIFI_INFERENCE_RISK};
use super::{Artifact, Collector, LookupOptions};
use crate::models::{LocationPoint, RetentionEstimate, SourceType};
use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

static KV_BSSID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbssid\s*[=:]\s*([0-9a-f]{2}(?::[0-9a-f]{2}){5})\b").unwrap()
});
static KV_SSID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bssid\s*[=:]\s*"?([^",]*?)"?\s*(?:,|$|\s+\w+\s*[=:])"#).unwrap());
static KV_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:level|rssi)\s*[=:]\s*(-?\d+)\b").unwrap());

/// `bssid frequency level flags ssid` rows from the scan results table.
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5})\s+(\d{4,5})\s+(-?\d+)\s+(\S+)\s*(.*?)\s*$",
    )
    .unwrap()
});

/// One access point seen in a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPoint {
    pub bssid: String,
    pub ssid: String,
    /// Signal level in dBm (closer to zero is stronger).
    pub level: i32,
    pub frequency: Option<u32>,
    pub reference: String,
}

/// Parse one scan line in either key/value or table form.
pub fn parse_access_point(line: &str, reference: String) -> Option<AccessPoint> {
    if let Some(bssid) = KV_BSSID.captures(line).and_then(|c| c.get(1)) {
        let level = KV_LEVEL
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())?;
        let ssid = KV_SSID
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        return Some(AccessPoint {
            bssid: bssid.as_str().to_lowercase(),
            ssid,
            level,
            frequency: None,
            reference,
        });
    }

    let caps = TABLE_ROW.captures(line)?;
    Some(AccessPoint {
        bssid: caps[1].to_lowercase(),
        ssid: caps[5].to_string(),
        level: caps[3].parse().ok()?,
        frequency: caps[2].parse().ok(),
        reference,
    })
}

/// Keep the strongest reading per BSSID, then the `limit` strongest overall.
pub fn strongest(access_points: Vec<AccessPoint>, limit: usize) -> Vec<AccessPoint> {
    let mut best: HashMap<String, AccessPoint> = HashMap::new();
    let mut order = Vec::new();

    for ap in access_points {
        let replace = match best.get(&ap.bssid) {
            Some(existing) => existing.level < ap.level,
            None => {
                order.push(ap.bssid.clone());
                true
            }
        };
        if replace {
            best.insert(ap.bssid.clone(), ap);
        }
    }

    let mut unique: Vec<AccessPoint> = order.iter().filter_map(|b| best.remove(b)).collect();
    // stable: equal levels keep scan order
    unique.sort_by(|a, b| b.level.cmp(&a.level));
    unique.truncate(limit);
    unique
}

pub struct WifiCollector {
    artifact: Artifact,
    options: LookupOptions,
}

impl WifiCollector {
    pub fn new(dir: &std::path::Path, file_name: &str, options: LookupOptions) -> Self {
        Self {
            artifact: Artifact::new(dir, file_name),
            options,
        }
    }

    /// The strongest access points in the scan dump.
    pub fn access_points(&self) -> Result<Vec<AccessPoint>> {
        let lines = self.artifact.read_lines()?;
        let parsed: Vec<AccessPoint> = lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| parse_access_point(line, self.artifact.reference(index + 1)))
            .collect();

        debug!("{} access point readings in scan dump", parsed.len());
        Ok(strongest(parsed, self.options.wifi_max_networks))
    }
}

impl Collector for WifiCollector {
    fn name(&self) -> &str {
        "wifi"
    }

    fn can_run(&self) -> bool {
        self.artifact.exists()
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        RetentionEstimate::Minutes
    }

    fn collect(&self) -> Result<Vec<LocationPoint>> {
        let access_points = self.access_points()?;

        if !self.options.external_lookup {
            info!(
                "Kept {} strongest access points; external lookup disabled, no positions derived",
                access_points.len()
            );
            return Ok(Vec::new());
        }

        let Some(geolocator) = self.options.geolocator.as_ref() else {
            warn!(
                "External lookup requested but no geolocation service is configured; \
                 {} access points left unresolved",
                access_points.len()
            );
            return Ok(Vec::new());
        };

        if access_points.is_empty() {
            return Ok(Vec::new());
        }

        let fix = match geolocator.locate_wifi(&access_points) {
            Ok(Some(fix)) => fix,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!("Wi-Fi lookup failed: {}", e);
                return Ok(Vec::new());
            }
        };

        let now = Utc::now();
        let bssids: Vec<&str> = access_points.iter().map(|ap| ap.bssid.as_str()).collect();
        let references: Vec<&str> = access_points.iter().map(|ap| ap.reference.as_str()).collect();

        let result = LocationPoint::builder(SourceType::Wifi, self.name())
            .position(fix.latitude, fix.longitude)
            .timestamp(now)
            .provider(fix.service.clone())
            .raw_reference(references.join(","))
            .precision(fix.accuracy_meters)
            .retention(self.retention_estimate())
            .inferred(WIFI_INFERENCE_METHOD, WIFI_INFERENCE_RISK)
            .device_context("bssids", bssids)
            .device_context("strongest_level_dbm", access_points[0].level)
            .metadata("timestamp_source", "collection_time")
            .build_at(now);

        match result {
            Ok(point) => Ok(vec![point]),
            Err(e) => {
                debug!("Discarding Wi-Fi lookup result: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn skip_reason(&self) -> String {
        format!("{} not found", self.artifact.file_name())
    }
}
