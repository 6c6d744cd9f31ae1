//! Root-level source stub.
//!
//! Root access would expose location databases (Google location history,
//! fused provider caches), but extracting them is deliberately not done.
//! This collector only checks whether root was available so the audit trail
//! records that those sources were left untouched.

use super::{Artifact, Collector};
use crate::models::{LocationPoint, RetentionEstimate};
use anyhow::Result;
use std::fs;
use tracing::debug;

pub struct RootCollector {
    root_check: Artifact,
    root_available: bool,
}

impl RootCollector {
    pub fn new(dir: &std::path::Path, check_file: &str) -> Self {
        let root_check = Artifact::new(dir, check_file);
        let root_available = detect_root(&root_check);
        Self {
            root_check,
            root_available,
        }
    }
}

/// Root is available iff the captured `su -c id` output reports uid 0.
fn detect_root(check: &Artifact) -> bool {
    match fs::read_to_string(check.path()) {
        Ok(output) => output.contains("uid=0"),
        Err(e) => {
            debug!("Root check {} unreadable: {}", check.file_name(), e);
            false
        }
    }
}

impl Collector for RootCollector {
    fn name(&self) -> &str {
        "root"
    }

    fn can_run(&self) -> bool {
        false
    }

    fn retention_estimate(&self) -> RetentionEstimate {
        RetentionEstimate::Unknown
    }

    fn collect(&self) -> Result<Vec<LocationPoint>> {
        Ok(Vec::new())
    }

    fn skip_reason(&self) -> String {
        let availability = if self.root_available {
            "root access detected"
        } else {
            "root access not available"
        };
        format!(
            "{} (checked {}); root-level location databases were not exploited",
            availability,
            self.root_check.file_name()
        )
    }
}
