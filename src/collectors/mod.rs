//! Source collectors.
//!
//! Each collector parses one raw artifact captured from the device into
//! [`LocationPoint`] candidates. All collectors share the [`Collector`]
//! contract so the aggregator can run them uniformly, in priority order:
//! logcat, dumpsys, cell towers, Wi-Fi, app logs, root.

pub mod app_location;
pub mod cell_tower;
pub mod dumpsys;
pub mod geolocate;
pub mod logcat;
pub mod patterns;
pub mod root;
pub mod wifi;

pub use app_location::AppLocationCollector;
pub use cell_tower::CellTowerCollector;
pub use dumpsys::DumpsysCollector;
pub use geolocate::Geolocator;
pub use logcat::LogcatCollector;
pub use root::RootCollector;
pub use wifi::WifiCollector;

use crate::config::ArtifactsConfig;
use crate::models::{LocationPoint, RetentionEstimate};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Common contract for every evidence source.
pub trait Collector: Send + Sync {
    /// Stable identifier used in the audit log.
    fn name(&self) -> &str;

    /// Whether the raw artifact this collector needs is present.
    fn can_run(&self) -> bool;

    /// Typical lifetime of the source artifact on-device.
    fn retention_estimate(&self) -> RetentionEstimate;

    /// Parse the artifact.
    ///
    /// Malformed records are skipped; an `Err` means the artifact as a
    /// whole could not be processed.
    fn collect(&self) -> Result<Vec<LocationPoint>>;

    /// Audit reason recorded when `can_run` is false.
    fn skip_reason(&self) -> String {
        "required artifact not found".to_string()
    }
}

/// Options controlling inference-producing collectors.
#[derive(Clone)]
pub struct LookupOptions {
    /// Caller explicitly asked for external geolocation.
    pub external_lookup: bool,
    /// Service used when lookup is enabled.
    pub geolocator: Option<Arc<dyn Geolocator>>,
    /// Strongest Wi-Fi networks kept for lookup.
    pub wifi_max_networks: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            external_lookup: false,
            geolocator: None,
            wifi_max_networks: 3,
        }
    }
}

impl std::fmt::Debug for LookupOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupOptions")
            .field("external_lookup", &self.external_lookup)
            .field("geolocator", &self.geolocator.is_some())
            .field("wifi_max_networks", &self.wifi_max_networks)
            .finish()
    }
}

/// A raw text artifact on disk.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// File name used in raw references.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// `file:line` pointer back to the evidence (1-indexed).
    pub fn reference(&self, line_number: usize) -> String {
        format!("{}:{}", self.file_name(), line_number)
    }

    /// Read the artifact as lines, replacing invalid UTF-8.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read artifact: {}", self.path.display()))?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(String::from)
            .collect())
    }
}

/// Build the full collector set in priority order.
pub fn default_collectors(
    artifacts: &ArtifactsConfig,
    dir: &Path,
    options: &LookupOptions,
) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(LogcatCollector::new(dir, &artifacts.logcat_files)),
        Box::new(DumpsysCollector::new(dir, &artifacts.dumpsys_file)),
        Box::new(CellTowerCollector::new(dir, &artifacts.cell_file, options.clone())),
        Box::new(WifiCollector::new(dir, &artifacts.wifi_file, options.clone())),
        Box::new(AppLocationCollector::new(dir, &artifacts.app_file)),
        Box::new(RootCollector::new(dir, &artifacts.root_check_file)),
    ]
}
