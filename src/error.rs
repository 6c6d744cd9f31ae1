//! Typed error definitions.
//!
//! Point validation and snapshot storage have failure modes callers need to
//! match on; everything else propagates through `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a [`LocationPoint`](crate::models::LocationPoint) cannot be built.
///
/// A validation failure rejects a single record. Collectors skip the
/// offending line and keep parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A mandatory field was never set
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Latitude or longitude is NaN or infinite
    #[error("coordinate is not a finite number: {0}")]
    NonFiniteCoordinate(&'static str),

    /// Latitude outside [-90, 90]
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180]
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),

    /// Exact (0, 0), the usual signature of an unset fix
    #[error("coordinates (0, 0) are rejected as an unset position")]
    NullIsland,

    /// An attribution field is empty or whitespace
    #[error("attribution field must not be empty: {0}")]
    EmptyAttribution(&'static str),

    /// An inferred point without its method or risk
    #[error("inferred point is missing {0}")]
    MissingInferenceDetail(&'static str),

    /// Precision must be a finite, non-negative distance
    #[error("invalid precision: {0}")]
    InvalidPrecision(f64),

    /// Stored score outside [0, 100]
    #[error("confidence score out of range: {0}")]
    ScoreOutOfRange(f64),

    /// `timestamp` and `timestamp_unix` describe different instants
    #[error("timestamp {timestamp} disagrees with timestamp_unix {timestamp_unix}")]
    TimestampMismatch { timestamp: i64, timestamp_unix: i64 },
}

/// Snapshot persistence and readback errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot has been written yet
    #[error("no data at {}: run extraction first", .path.display())]
    NoData { path: PathBuf },

    /// I/O error while reading or writing the snapshot
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot content could not be (de)serialized
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The atomic rename over the previous snapshot failed
    #[error("failed to replace snapshot at {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
