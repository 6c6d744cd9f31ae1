//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// GeoEvidence - forensic location evidence from Android artifacts
///
/// Collects location signals from extracted device artifacts (logcat,
/// dumpsys, cell and Wi-Fi dumps, app logs), scores and de-duplicates them,
/// and keeps an auditable snapshot that can be queried afterwards.
///
/// Examples:
///   geoevidence collect --artifacts ./case42
///   geoevidence query --source gps,fused --min-confidence high
///   geoevidence query --start 1700000000 --end 1700086400 --format json
///   geoevidence audit
///   geoevidence init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .geoevidence.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output (includes full error traces)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every collector and persist a new snapshot
    Collect(CollectArgs),
    /// Filter and summarise the points in a snapshot
    Query(QueryArgs),
    /// Show the audit trail of the last collection run
    Audit(AuditArgs),
    /// Generate a default .geoevidence.toml configuration file
    InitConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CollectArgs {
    /// Directory containing the extracted raw artifacts
    #[arg(short, long, value_name = "DIR", env = "GEOEVIDENCE_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Snapshot file to write
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Allow cell tower / Wi-Fi positions via an external geolocation service
    ///
    /// Positions obtained this way are always flagged as inferred.
    #[arg(long)]
    pub enable_external_lookup: bool,

    /// Abort the collection run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct QueryArgs {
    /// Snapshot file to read
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Earliest unix timestamp to include (inclusive)
    #[arg(long, value_name = "UNIX")]
    pub start: Option<i64>,

    /// Latest unix timestamp to include (inclusive)
    #[arg(long, value_name = "UNIX")]
    pub end: Option<i64>,

    /// Source types to include (comma-separated)
    ///
    /// Example: --source gps,fused,network
    #[arg(long, value_name = "TYPES", value_delimiter = ',')]
    pub source: Option<Vec<SourceArg>>,

    /// Minimum confidence level to include
    #[arg(long, value_name = "LEVEL")]
    pub min_confidence: Option<ConfidenceArg>,

    /// Output format (summary, json)
    #[arg(long, default_value = "summary", value_name = "FORMAT")]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AuditArgs {
    /// Snapshot file to read
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Output format (summary, json)
    #[arg(long, default_value = "summary", value_name = "FORMAT")]
    pub format: OutputFormat,
}

/// Output format for query and audit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain-text summary (default)
    #[default]
    Summary,
    /// JSON result envelope
    Json,
}

/// Source type values accepted by --source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceArg {
    Gps,
    Network,
    Wifi,
    Cell,
    Fused,
    App,
}

/// Confidence level values accepted by --min-confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum ConfidenceArg {
    Low,
    Medium,
    High,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Collect(collect) => {
                if let Some(timeout) = collect.timeout {
                    if timeout == 0 {
                        return Err("Timeout must be at least 1 second".to_string());
                    }
                }

                if let Some(ref dir) = collect.artifacts {
                    if !dir.exists() {
                        return Err(format!(
                            "Artifact directory does not exist: {}",
                            dir.display()
                        ));
                    }
                    if !dir.is_dir() {
                        return Err(format!(
                            "Artifact path is not a directory: {}",
                            dir.display()
                        ));
                    }
                }
            }
            Command::Query(query) => {
                if let (Some(start), Some(end)) = (query.start, query.end) {
                    if start > end {
                        return Err("--start must not be after --end".to_string());
                    }
                }
            }
            Command::Audit(_) | Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_query_filters() {
        let args = parse(&[
            "geoevidence",
            "query",
            "--source",
            "gps,fused",
            "--min-confidence",
            "high",
            "--start",
            "10",
            "--format",
            "json",
        ]);

        let Command::Query(query) = args.command else {
            panic!("expected query command");
        };
        assert_eq!(query.source, Some(vec![SourceArg::Gps, SourceArg::Fused]));
        assert_eq!(query.min_confidence, Some(ConfidenceArg::High));
        assert_eq!(query.start, Some(10));
        assert_eq!(query.end, None);
        assert_eq!(query.format, OutputFormat::Json);
    }

    #[test]
    fn test_external_lookup_off_by_default() {
        let args = parse(&["geoevidence", "collect"]);
        let Command::Collect(collect) = args.command else {
            panic!("expected collect command");
        };
        assert!(!collect.enable_external_lookup);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["geoevidence", "-v", "-q", "audit"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_time_range() {
        let args = parse(&["geoevidence", "query", "--start", "20", "--end", "10"]);
        assert!(args.validate().is_err());

        let args = parse(&["geoevidence", "collect", "--timeout", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["geoevidence", "audit"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
