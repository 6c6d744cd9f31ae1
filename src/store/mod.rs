//! Snapshot persistence.
//!
//! A collection run is persisted as one JSON document holding the
//! de-duplicated points and the audit log of that run. The file is replaced
//! atomically so readers only ever see the previous or the new snapshot.

use crate::audit::AuditLogEntry;
use crate::error::StoreError;
use crate::models::LocationPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Result of one complete collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_id: Uuid,
    pub extracted_at: DateTime<Utc>,
    pub external_lookup_enabled: bool,
    pub points: Vec<LocationPoint>,
    pub audit_log: Vec<AuditLogEntry>,
}

impl Snapshot {
    pub fn new(
        points: Vec<LocationPoint>,
        audit_log: Vec<AuditLogEntry>,
        external_lookup_enabled: bool,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            extracted_at: Utc::now(),
            external_lookup_enabled,
            points,
            audit_log,
        }
    }

    /// Audit-only view of the snapshot.
    pub fn audit_trail(&self) -> AuditTrail {
        AuditTrail {
            run_id: self.run_id,
            extracted_at: self.extracted_at,
            external_lookup_enabled: self.external_lookup_enabled,
            audit_log: self.audit_log.clone(),
        }
    }
}

/// The audit log of the last run with the context needed to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub run_id: Uuid,
    pub extracted_at: DateTime<Utc>,
    pub external_lookup_enabled: bool,
    pub audit_log: Vec<AuditLogEntry>,
}

/// File-backed snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored snapshot.
    ///
    /// Written to a temporary file in the target directory, then renamed
    /// over the old one.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let json = serde_json::to_vec_pretty(snapshot)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        debug!(
            "Saved snapshot {} ({} points) to {}",
            snapshot.run_id,
            snapshot.points.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the last persisted snapshot.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NoData {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&content)?)
    }

    pub fn load_points(&self) -> Result<Vec<LocationPoint>, StoreError> {
        Ok(self.load()?.points)
    }

    pub fn load_audit(&self) -> Result<AuditTrail, StoreError> {
        Ok(self.load()?.audit_trail())
    }
}
