//! Drift detection — compare lock hashes to the control plane.
//!
//! A converged lock entry records the desired-state hash the resource was
//! last reconciled to. If the provider now reports a different hash (or no
//! resource at all), someone changed live state out-of-band.

use crate::core::types::{ResourceKind, ResourceStatus, StateLock};
use crate::error::Result;
use crate::provider::Provider;

/// A single drift finding.
#[derive(Debug, Clone)]
pub struct DriftFinding {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Check every converged lock entry against the provider's current state.
pub fn detect_drift(lock: &StateLock, provider: &dyn Provider) -> Result<Vec<DriftFinding>> {
    let mut findings = Vec::new();

    for (id, entry) in &lock.resources {
        if entry.status != ResourceStatus::Converged {
            continue;
        }

        match provider.current_state(id)? {
            None => findings.push(DriftFinding {
                resource_id: id.clone(),
                resource_kind: entry.resource_kind,
                expected_hash: entry.hash.clone(),
                actual_hash: "MISSING".to_string(),
                detail: "resource no longer present".to_string(),
            }),
            Some(state) if state.hash != entry.hash => findings.push(DriftFinding {
                resource_id: id.clone(),
                resource_kind: entry.resource_kind,
                expected_hash: entry.hash.clone(),
                actual_hash: state.hash,
                detail: "live state diverged from last converged state".to_string(),
            }),
            Some(_) => {}
        }
    }

    Ok(findings)
}
