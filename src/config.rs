//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.geoevidence.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".geoevidence.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Raw artifact locations.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Collection settings.
    #[serde(default)]
    pub collection: CollectionConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Snapshot file written by `collect` and read by `query`/`audit`.
    #[serde(default = "default_snapshot")]
    pub snapshot: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            verbose: false,
        }
    }
}

fn default_snapshot() -> String {
    "location_snapshot.json".to_string()
}

/// Names of the raw text artifacts produced by device extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding the extracted artifacts.
    #[serde(default = "default_artifact_dir")]
    pub directory: String,

    /// Logcat captures, scanned in order.
    #[serde(default = "default_logcat_files")]
    pub logcat_files: Vec<String>,

    /// `dumpsys location` output.
    #[serde(default = "default_dumpsys_file")]
    pub dumpsys_file: String,

    /// `dumpsys telephony.registry` cell info output.
    #[serde(default = "default_cell_file")]
    pub cell_file: String,

    /// `dumpsys wifi` scan results.
    #[serde(default = "default_wifi_file")]
    pub wifi_file: String,

    /// Application log extract.
    #[serde(default = "default_app_file")]
    pub app_file: String,

    /// Captured output of `su -c id`.
    #[serde(default = "default_root_check_file")]
    pub root_check_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            directory: default_artifact_dir(),
            logcat_files: default_logcat_files(),
            dumpsys_file: default_dumpsys_file(),
            cell_file: default_cell_file(),
            wifi_file: default_wifi_file(),
            app_file: default_app_file(),
            root_check_file: default_root_check_file(),
        }
    }
}

fn default_artifact_dir() -> String {
    "artifacts".to_string()
}

fn default_logcat_files() -> Vec<String> {
    vec!["logcat_location.txt", "logcat.txt"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_dumpsys_file() -> String {
    "dumpsys_location.txt".to_string()
}

fn default_cell_file() -> String {
    "cell_info.txt".to_string()
}

fn default_wifi_file() -> String {
    "wifi_scan.txt".to_string()
}

fn default_app_file() -> String {
    "app_location.txt".to_string()
}

fn default_root_check_file() -> String {
    "root_check.txt".to_string()
}

/// Collection run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Allow CellTower/WiFi collectors to query an external geolocation
    /// service. Off unless explicitly enabled.
    #[serde(default)]
    pub external_lookup: bool,

    /// Abort the whole run after this many seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Strongest Wi-Fi networks kept from a scan.
    #[serde(default = "default_wifi_max_networks")]
    pub wifi_max_networks: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            external_lookup: false,
            timeout_seconds: default_timeout(),
            wifi_max_networks: default_wifi_max_networks(),
        }
    }
}

fn default_timeout() -> u64 {
    120
}

fn default_wifi_max_networks() -> usize {
    3
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            crate::cli::Command::Collect(collect) => {
                if let Some(ref dir) = collect.artifacts {
                    self.artifacts.directory = dir.display().to_string();
                }
                if let Some(ref snapshot) = collect.snapshot {
                    self.general.snapshot = snapshot.display().to_string();
                }
                if collect.enable_external_lookup {
                    self.collection.external_lookup = true;
                }
                if let Some(timeout) = collect.timeout {
                    self.collection.timeout_seconds = timeout;
                }
            }
            crate::cli::Command::Query(query) => {
                if let Some(ref snapshot) = query.snapshot {
                    self.general.snapshot = snapshot.display().to_string();
                }
            }
            crate::cli::Command::Audit(audit) => {
                if let Some(ref snapshot) = audit.snapshot {
                    self.general.snapshot = snapshot.display().to_string();
                }
            }
            crate::cli::Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, AuditArgs, CollectArgs, Command, OutputFormat};
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.collection.external_lookup);
        assert_eq!(config.collection.wifi_max_networks, 3);
        assert_eq!(config.artifacts.logcat_files.len(), 2);
        assert_eq!(config.general.snapshot, "location_snapshot.json");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
snapshot = "case42.json"

[artifacts]
directory = "/evidence/case42"
dumpsys_file = "dumpsys.txt"

[collection]
timeout_seconds = 30
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.snapshot, "case42.json");
        assert_eq!(config.artifacts.directory, "/evidence/case42");
        assert_eq!(config.artifacts.dumpsys_file, "dumpsys.txt");
        assert_eq!(config.artifacts.wifi_file, "wifi_scan.txt");
        assert_eq!(config.collection.timeout_seconds, 30);
        assert!(!config.collection.external_lookup);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[artifacts]"));
        assert!(toml_str.contains("[collection]"));
        assert!(toml_str.contains("external_lookup = false"));
    }

    #[test]
    fn test_merge_only_explicit_flags() {
        let mut config = Config::default();
        config.collection.timeout_seconds = 45;

        let args = Args {
            config: None,
            verbose: false,
            quiet: false,
            command: Command::Collect(CollectArgs {
                artifacts: Some(PathBuf::from("/tmp/case")),
                snapshot: None,
                enable_external_lookup: false,
                timeout: None,
            }),
        };
        config.merge_with_args(&args);

        assert_eq!(config.artifacts.directory, "/tmp/case");
        assert_eq!(config.general.snapshot, "location_snapshot.json");
        assert_eq!(config.collection.timeout_seconds, 45);
        assert!(!config.collection.external_lookup);

        let args = Args {
            config: None,
            verbose: true,
            quiet: false,
            command: Command::Audit(AuditArgs {
                snapshot: Some(PathBuf::from("other.json")),
                format: OutputFormat::Summary,
            }),
        };
        config.merge_with_args(&args);
        assert_eq!(config.general.snapshot, "other.json");
        assert!(config.general.verbose);
    }
}
