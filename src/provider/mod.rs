//! Control-plane seam — the narrow interface the engine consumes.
//!
//! The diff/apply engine itself is owned by the external provisioning
//! platform and is never re-implemented here. Everything downstream of the
//! planner talks to live state only through [`Provider`]: an eventually
//! consistent key-value store keyed by resource identity.

pub mod local;
pub mod memory;

use crate::artifact::ArtifactRef;
use crate::core::types::{Resource, ResourceKind};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Identity of a materialized resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub resource_id: String,
    pub external_id: String,
}

/// Observable state of a materialized resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub external_id: String,
    pub kind: ResourceKind,

    /// Hash of the desired state the resource was last converged to
    pub hash: String,
}

/// One reconciliation request, template-resolved.
#[derive(Debug)]
pub struct ApplyRequest<'a> {
    pub resource_id: &'a str,
    pub resource: &'a Resource,

    /// Resolved code artifact for functions; `None` for roles
    pub artifact: Option<&'a ArtifactRef>,
    pub desired_hash: &'a str,
}

/// The diff/apply engine surface.
pub trait Provider {
    /// Current state of a resource, or `None` if it does not exist.
    fn current_state(&self, resource_id: &str) -> Result<Option<ResourceState>>;

    /// Reconcile one resource toward its desired state.
    fn apply(&mut self, request: &ApplyRequest<'_>) -> Result<ResourceHandle>;

    /// Remove a materialized resource. Removing a missing resource is a
    /// no-op.
    fn destroy(&mut self, resource_id: &str) -> Result<()>;

    /// Invoke a deployed function with an event payload.
    fn invoke(&self, function_id: &str, event: &serde_json::Value) -> Result<serde_json::Value>;
}

/// Control-plane name of a resource: the declared name, or the resource id.
pub fn cloud_name<'a>(resource: &'a Resource, resource_id: &'a str) -> &'a str {
    let name = match resource {
        Resource::Role(r) => r.name.as_deref(),
        Resource::Function(f) => f.name.as_deref(),
    };
    name.unwrap_or(resource_id)
}

/// Fixed-shape invocation payload. Invoking a deployed function never fails
/// for a well-formed event.
pub(crate) fn invocation_payload(name: &str) -> serde_json::Value {
    serde_json::json!({ "Status": format!("function {} ready", name) })
}
