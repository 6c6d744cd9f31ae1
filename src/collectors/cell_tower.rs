//! Cell tower collector.
//!
//! Extracts MCC/MNC/LAC/CID tuples from a telephony registry dump. Tower
//! identifiers are not positions: without an explicit external lookup this
//! collector only reports how many towers it saw and returns no points.

use super::geolocate::{CELL_INFERENCE_METHOD, CELL_INFERENCE_RISK};
use super::{Artifact, Collector, LookupOptions};
use crate::models::{LocationPoint, RetentionEstimate, SourceType};
use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

static MCC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bm?mcc\s*[=:]\s*(\d{3})\b").unwrap());
static MNC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bm?mnc\s*[=:]\s*(\d{2,3})\b").unwrap());
static LAC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bm?(?:lac|tac)\s*[=:]\s*(\d+)\b").unwrap());
static CID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bm?(?:cid|ci)\s*[=:]\s*(\d+)\b").unwrap());

/// Android reports unavailable identity fields as `Integer.MAX_VALUE`.
const UNAVAILABLE: u64 = i32::MAX as u64;

/// One observed cell identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellTower {
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u64,
    pub cid: u64,
    /// `file:line` where the tower was seen first.
    pub reference: String,
}

impl CellTower {
    fn key(&self) -> (u16, u16, u64, u64) {
        (self.mcc, self.mnc, self.lac, self.cid)
    }
}

fn field<T: std::str::FromStr>(re: &Regex, line: &str) -> Option<T> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Parse a tower tuple from one line; all four identifiers are required.
pub fn parse_tower(line: &str, reference: String) -> Option<CellTower> {
    let tower = CellTower {
        mcc: field(&MCC, line)?,
        mnc: field(&MNC, line)?,
        lac: field(&LAC, line)?,
        cid: field(&CID, line)?,
        reference,
    };

    if tower.lac == UNAVAILABLE || tower.cid == UNAVAILABLE {
        return None;
    }
    Some(tower)
}

pub struct CellTowerCollector {
    artifact: Artifact,
    options: LookupOptions,
}

impl CellTowerCollector {
    pub fn new(dir: &std::path::Path, file_name: &str, options: LookupOptions) -> Self {
        Self {
            artifact: Artifact::new(dir, file_name),
            options,
        }
    }

    /// Unique towers in order of first appearance.
    pub fn towers(&self) -> Result<Vec<CellTower>> {
        let lines = self.artifact.read_lines()?;
        let mut seen = HashSet::new();

        Ok(lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| parse_tower(line, self.artifact.reference(index + 1)))
            .filter(|tower| seen.insert(tower.key()))
            .collect())
    }
}

impl Collector for CellTowerCollector {
    fn name(&self) -> &str {
        "cell_tower"
    }

    fn can_run(&self) -> bool {
        self.artifact.exists()
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        RetentionEstimate::Minutes
    }

    fn collect(&self) -> Result<Vec<LocationPoint>> {
        let towers = self.towers()?;

        if !self.options.external_lookup {
            info!(
                "Found {} cell towers; external lookup disabled, no positions derived",
                towers.len()
            );
            return Ok(Vec::new());
        }

        let Some(geolocator) = self.options.geolocator.as_ref() else {
            warn!(
                "External lookup requested but no geolocation service is configured; \
                 {} cell towers left unresolved",
                towers.len()
            );
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let mut points = Vec::new();

        for tower in &towers {
            let fix = match geolocator.locate_cell(tower) {
                Ok(Some(fix)) => fix,
                Ok(None) => {
                    debug!("No position for tower {:?}", tower.key());
                    continue;
                }
                Err(e) => {
                    warn!("Lookup failed for {}: {}", tower.reference, e);
                    continue;
                }
            };

            let result = LocationPoint::builder(SourceType::Cell, self.name())
                .position(fix.latitude, fix.longitude)
                .timestamp(now)
                .provider(fix.service.clone())
                .raw_reference(tower.reference.clone())
                .precision(fix.accuracy_meters)
                .retention(self.retention_estimate())
                .inferred(CELL_INFERENCE_METHOD, CELL_INFERENCE_RISK)
                .device_context("mcc", tower.mcc)
                .device_context("mnc", tower.mnc)
                .device_context("lac", tower.lac)
                .device_context("cid", tower.cid)
                .metadata("timestamp_source", "collection_time")
                .build_at(now);

            match result {
                Ok(point) => points.push(point),
                Err(e) => debug!("Discarding lookup result for {}: {}", tower.reference, e),
            }
        }

        Ok(points)
    }

    fn skip_reason(&self) -> String {
        format!("{} not found", self.artifact.file_name())
    }
}
