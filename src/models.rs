//! Data models for location evidence.
//!
//! This module contains the forensic point record, its enumerations and the
//! confidence scoring rules. Points are only ever produced through
//! [`LocationPointBuilder`], which enforces every integrity check.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Kind of signal a point was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "GPS")]
    Gps,
    Network,
    #[serde(rename = "WiFi")]
    Wifi,
    Cell,
    Fused,
    App,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Gps => write!(f, "GPS"),
            SourceType::Network => write!(f, "Network"),
            SourceType::Wifi => write!(f, "WiFi"),
            SourceType::Cell => write!(f, "Cell"),
            SourceType::Fused => write!(f, "Fused"),
            SourceType::App => write!(f, "App"),
        }
    }
}

impl SourceType {
    /// Map an Android location provider name to a source type.
    ///
    /// `passive` and anything unrecognised are treated as network fixes.
    pub fn from_provider(provider: &str) -> Self {
        match provider.to_lowercase().as_str() {
            "gps" => SourceType::Gps,
            "fused" => SourceType::Fused,
            _ => SourceType::Network,
        }
    }
}

/// How long the originating artifact typically keeps data on-device.
///
/// This is a property of the source channel, fixed at collection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RetentionEstimate {
    Minutes,
    Hours,
    Days,
    #[default]
    Unknown,
}

impl fmt::Display for RetentionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionEstimate::Minutes => write!(f, "Minutes"),
            RetentionEstimate::Hours => write!(f, "Hours"),
            RetentionEstimate::Days => write!(f, "Days"),
            RetentionEstimate::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Confidence band derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "Low"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::High => write!(f, "High"),
        }
    }
}

impl ConfidenceLevel {
    /// Band a score: >= 70 High, 40..70 Medium, else Low.
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ConfidenceLevel::High
        } else if score >= 40.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Ordinal used for minimum-confidence filtering.
    pub fn ordinal(&self) -> u8 {
        match self {
            ConfidenceLevel::Low => 0,
            ConfidenceLevel::Medium => 1,
            ConfidenceLevel::High => 2,
        }
    }
}

/// Compute the confidence score for a point.
///
/// Starts at 50, rewards known precision and satellite/fused sources,
/// penalises inference and stale timestamps, and clamps to [0, 100].
pub fn confidence_score(
    precision_meters: Option<f64>,
    source_type: SourceType,
    is_inferred: bool,
    timestamp_unix: i64,
    now_unix: i64,
) -> f64 {
    let mut score = 50.0;

    if let Some(precision) = precision_meters {
        if precision < 50.0 {
            score += 30.0;
        } else if precision < 200.0 {
            score += 15.0;
        }
    }

    match source_type {
        SourceType::Gps | SourceType::Fused => score += 20.0,
        SourceType::Network => score += 10.0,
        _ => {}
    }

    if is_inferred {
        score -= 30.0;
    }

    let age_hours = (now_unix - timestamp_unix) as f64 / 3600.0;
    if age_hours > 1.0 {
        score -= f64::min(20.0, age_hours / 5.0);
    }

    score.clamp(0.0, 100.0)
}

/// A single geolocated, timestamped observation with full attribution.
///
/// Fields are private: a point can only come out of
/// [`LocationPointBuilder::build_at`] or be deserialized through
/// [`RawLocationPoint`], and both paths run the same coordinate, attribution
/// and inference checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLocationPoint")]
pub struct LocationPoint {
    id: Uuid,
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    timestamp_unix: i64,
    retention_estimate: RetentionEstimate,
    source_type: SourceType,
    origin: String,
    provider: String,
    raw_reference: String,
    precision_meters: Option<f64>,
    confidence_score: f64,
    confidence_level: ConfidenceLevel,
    is_inferred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inference_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inference_risk: Option<String>,
    #[serde(default)]
    device_context: BTreeMap<String, Value>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

impl LocationPoint {
    /// Start building a point for the given source and collector.
    pub fn builder(source_type: SourceType, origin: impl Into<String>) -> LocationPointBuilder {
        LocationPointBuilder::new(source_type, origin)
    }

    #[allow(dead_code)] // Record identity, carried in the snapshot
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn timestamp_unix(&self) -> i64 {
        self.timestamp_unix
    }

    #[allow(dead_code)] // Accessor, serialized with the point
    pub fn retention_estimate(&self) -> RetentionEstimate {
        self.retention_estimate
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn raw_reference(&self) -> &str {
        &self.raw_reference
    }

    pub fn precision_meters(&self) -> Option<f64> {
        self.precision_meters
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }

    pub fn is_inferred(&self) -> bool {
        self.is_inferred
    }

    pub fn inference_method(&self) -> Option<&str> {
        self.inference_method.as_deref()
    }

    pub fn inference_risk(&self) -> Option<&str> {
        self.inference_risk.as_deref()
    }

    #[allow(dead_code)] // Accessor, serialized with the point
    pub fn device_context(&self) -> &BTreeMap<String, Value> {
        &self.device_context
    }

    #[allow(dead_code)] // Accessor, serialized with the point
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}

/// Staged construction of a [`LocationPoint`].
#[derive(Debug, Clone)]
pub struct LocationPointBuilder {
    source_type: SourceType,
    origin: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
    retention_estimate: RetentionEstimate,
    provider: String,
    raw_reference: String,
    precision_meters: Option<f64>,
    is_inferred: bool,
    inference_method: Option<String>,
    inference_risk: Option<String>,
    device_context: BTreeMap<String, Value>,
    metadata: BTreeMap<String, Value>,
}

impl LocationPointBuilder {
    fn new(source_type: SourceType, origin: impl Into<String>) -> Self {
        Self {
            source_type,
            origin: origin.into(),
            latitude: None,
            longitude: None,
            timestamp: None,
            retention_estimate: RetentionEstimate::Unknown,
            provider: String::new(),
            raw_reference: String::new(),
            precision_meters: None,
            is_inferred: false,
            inference_method: None,
            inference_risk: None,
            device_context: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn retention(mut self, retention: RetentionEstimate) -> Self {
        self.retention_estimate = retention;
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn raw_reference(mut self, reference: impl Into<String>) -> Self {
        self.raw_reference = reference.into();
        self
    }

    pub fn precision(mut self, meters: Option<f64>) -> Self {
        self.precision_meters = meters;
        self
    }

    /// Mark the point as derived rather than observed on-device.
    pub fn inferred(mut self, method: impl Into<String>, risk: impl Into<String>) -> Self {
        self.is_inferred = true;
        self.inference_method = Some(method.into());
        self.inference_risk = Some(risk.into());
        self
    }

    pub fn device_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.device_context.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Validate and build, scoring the point's age relative to `now`.
    pub fn build_at(self, now: DateTime<Utc>) -> Result<LocationPoint, ValidationError> {
        let latitude = self
            .latitude
            .ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = self
            .longitude
            .ok_or(ValidationError::MissingField("longitude"))?;
        let timestamp = self
            .timestamp
            .ok_or(ValidationError::MissingField("timestamp"))?;

        validate_coordinates(latitude, longitude)?;

        let origin = non_empty(self.origin, "origin")?;
        let provider = non_empty(self.provider, "provider")?;
        let raw_reference = non_empty(self.raw_reference, "raw_reference")?;

        validate_precision(self.precision_meters)?;
        let (inference_method, inference_risk) =
            validate_inference(self.is_inferred, self.inference_method, self.inference_risk)?;

        let timestamp_unix = timestamp.timestamp();
        let score = confidence_score(
            self.precision_meters,
            self.source_type,
            self.is_inferred,
            timestamp_unix,
            now.timestamp(),
        );

        Ok(LocationPoint {
            id: Uuid::new_v4(),
            latitude,
            longitude,
            timestamp,
            timestamp_unix,
            retention_estimate: self.retention_estimate,
            source_type: self.source_type,
            origin,
            provider,
            raw_reference,
            precision_meters: self.precision_meters,
            confidence_score: score,
            confidence_level: ConfidenceLevel::from_score(score),
            is_inferred: self.is_inferred,
            inference_method,
            inference_risk,
            device_context: self.device_context,
            metadata: self.metadata,
        })
    }
}

/// Check coordinate ranges and reject the (0, 0) placeholder.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() {
        return Err(ValidationError::NonFiniteCoordinate("latitude"));
    }
    if !longitude.is_finite() {
        return Err(ValidationError::NonFiniteCoordinate("longitude"));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    if latitude == 0.0 && longitude == 0.0 {
        return Err(ValidationError::NullIsland);
    }
    Ok(())
}

fn validate_precision(precision: Option<f64>) -> Result<(), ValidationError> {
    match precision {
        Some(p) if !p.is_finite() || p < 0.0 => Err(ValidationError::InvalidPrecision(p)),
        _ => Ok(()),
    }
}

/// Inferred points must name their method and risk; observed ones carry neither.
fn validate_inference(
    is_inferred: bool,
    method: Option<String>,
    risk: Option<String>,
) -> Result<(Option<String>, Option<String>), ValidationError> {
    if !is_inferred {
        return Ok((None, None));
    }

    let method = method
        .filter(|m| !m.trim().is_empty())
        .ok_or(ValidationError::MissingInferenceDetail("inference_method"))?;
    let risk = risk
        .filter(|r| !r.trim().is_empty())
        .ok_or(ValidationError::MissingInferenceDetail("inference_risk"))?;
    Ok((Some(method), Some(risk)))
}

/// Wire form of a [`LocationPoint`] as read back from a snapshot.
///
/// `confidence_level` is not read; it is re-derived from the score.
#[derive(Debug, Deserialize)]
pub struct RawLocationPoint {
    id: Uuid,
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    timestamp_unix: i64,
    #[serde(default)]
    retention_estimate: RetentionEstimate,
    source_type: SourceType,
    origin: String,
    provider: String,
    raw_reference: String,
    #[serde(default)]
    precision_meters: Option<f64>,
    confidence_score: f64,
    is_inferred: bool,
    #[serde(default)]
    inference_method: Option<String>,
    #[serde(default)]
    inference_risk: Option<String>,
    #[serde(default)]
    device_context: BTreeMap<String, Value>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

impl TryFrom<RawLocationPoint> for LocationPoint {
    type Error = ValidationError;

    fn try_from(raw: RawLocationPoint) -> Result<Self, Self::Error> {
        validate_coordinates(raw.latitude, raw.longitude)?;

        if raw.timestamp.timestamp() != raw.timestamp_unix {
            return Err(ValidationError::TimestampMismatch {
                timestamp: raw.timestamp.timestamp(),
                timestamp_unix: raw.timestamp_unix,
            });
        }

        let origin = non_empty(raw.origin, "origin")?;
        let provider = non_empty(raw.provider, "provider")?;
        let raw_reference = non_empty(raw.raw_reference, "raw_reference")?;

        validate_precision(raw.precision_meters)?;
        let (inference_method, inference_risk) =
            validate_inference(raw.is_inferred, raw.inference_method, raw.inference_risk)?;

        let score = raw.confidence_score;
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(ValidationError::ScoreOutOfRange(score));
        }

        Ok(LocationPoint {
            id: raw.id,
            latitude: raw.latitude,
            longitude: raw.longitude,
            timestamp: raw.timestamp,
            timestamp_unix: raw.timestamp_unix,
            retention_estimate: raw.retention_estimate,
            source_type: raw.source_type,
            origin,
            provider,
            raw_reference,
            precision_meters: raw.precision_meters,
            confidence_score: score,
            confidence_level: ConfidenceLevel::from_score(score),
            is_inferred: raw.is_inferred,
            inference_method,
            inference_risk,
            device_context: raw.device_context,
            metadata: raw.metadata,
        })
    }
}

fn non_empty(value: String, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyAttribution(field))
    } else {
        Ok(trimmed.to_string())
    }
}
