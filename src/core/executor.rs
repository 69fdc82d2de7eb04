//! Executor — the synchronous apply loop.
//!
//! Resources are applied strictly in resolved dependency order, one at a
//! time: resolve templates → resolve artifacts → plan against the control
//! plane → per resource: provider call → lock entry → provenance events.
//!
//! Provider errors are never retried and nothing is rolled back; a failed
//! run leaves previously-applied resources in place and an idempotent
//! re-run is the recovery mechanism.

use super::planner;
use super::resolver;
use super::state;
use super::types::*;
use crate::artifact::{self, ArtifactRef};
use crate::error::Result;
use crate::provenance::eventlog;
use crate::provider::{ApplyRequest, Provider};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::time::Instant;

/// Options for an apply run.
pub struct ApplyOptions<'a> {
    pub config: &'a StackConfig,

    /// Directory package paths are resolved against (usually the config
    /// file's directory)
    pub base_dir: &'a Path,
    pub state_dir: &'a Path,
    pub force: bool,
    pub dry_run: bool,
    pub resource_filter: Option<&'a str>,
}

/// Execute the apply loop against a provider.
pub fn apply(opts: &ApplyOptions<'_>, provider: &mut dyn Provider) -> Result<ApplyResult> {
    let start = Instant::now();

    let resolved = resolver::resolve_config(opts.config)?;
    let execution_order = resolver::build_execution_order(&resolved)?;
    let artifacts = resolve_artifacts(&resolved, opts.base_dir)?;
    let current = planner::current_states(provider, &resolved)?;
    let plan = planner::plan(&resolved, &execution_order, &artifacts, &current);

    if opts.dry_run {
        return Ok(ApplyResult {
            stack: resolved.name.clone(),
            resources_converged: 0,
            resources_unchanged: plan.unchanged,
            resources_failed: 0,
            total_duration: start.elapsed(),
        });
    }

    let run_id = eventlog::generate_run_id();
    let mut lock = state::load_lock(opts.state_dir, &resolved.name)?
        .unwrap_or_else(|| state::new_lock(&resolved.name));

    log_event(
        opts.state_dir,
        &resolved.name,
        resolved.policy.provenance,
        ProvenanceEvent::ApplyStarted {
            stack: resolved.name.clone(),
            run_id: run_id.clone(),
            lanzar_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );

    let mut converged = 0u32;
    let mut unchanged = 0u32;
    let mut failed = 0u32;

    let mut ctx = RecordCtx {
        lock: &mut lock,
        state_dir: opts.state_dir,
        stack: &resolved.name,
        provenance: resolved.policy.provenance,
        failure_policy: &resolved.policy.failure,
    };

    for change in &plan.changes {
        match apply_single_resource(opts, change, &resolved, &artifacts, provider, &mut ctx)? {
            ResourceOutcome::Converged | ResourceOutcome::Destroyed => converged += 1,
            ResourceOutcome::Unchanged => unchanged += 1,
            ResourceOutcome::Skipped => {}
            ResourceOutcome::Failed { should_stop } => {
                failed += 1;
                if should_stop {
                    break;
                }
            }
        }
    }

    // Rebind lock from ctx for finalization
    let lock = ctx.lock;
    lock.generated_at = eventlog::now_iso8601();
    if resolved.policy.lock_file {
        state::save_lock(opts.state_dir, lock)?;
    }

    log_event(
        opts.state_dir,
        &resolved.name,
        resolved.policy.provenance,
        ProvenanceEvent::ApplyCompleted {
            stack: resolved.name.clone(),
            run_id,
            resources_converged: converged,
            resources_unchanged: unchanged,
            resources_failed: failed,
            total_seconds: start.elapsed().as_secs_f64(),
        },
    );

    Ok(ApplyResult {
        stack: resolved.name.clone(),
        resources_converged: converged,
        resources_unchanged: unchanged,
        resources_failed: failed,
        total_duration: start.elapsed(),
    })
}

/// Resolve code artifacts for every function that should exist. Artifact
/// failures abort here, before any control-plane call.
pub fn resolve_artifacts(
    config: &StackConfig,
    base_dir: &Path,
) -> Result<FxHashMap<String, ArtifactRef>> {
    let mut artifacts = FxHashMap::default();
    for (id, resource) in &config.resources {
        if let Resource::Function(function) = resource {
            if resource.presence() == Presence::Present {
                artifacts.insert(id.clone(), artifact::resolve(&function.package, base_dir)?);
            }
        }
    }
    Ok(artifacts)
}

/// Outcome of reconciling a single resource.
enum ResourceOutcome {
    Converged,
    Destroyed,
    /// NoOp and not forced.
    Unchanged,
    /// Filtered out or not found.
    Skipped,
    /// Includes whether the failure policy says to stop.
    Failed { should_stop: bool },
}

/// Shared context for recording resource outcomes.
struct RecordCtx<'a> {
    lock: &'a mut StateLock,
    state_dir: &'a Path,
    stack: &'a str,
    provenance: bool,
    failure_policy: &'a FailurePolicy,
}

fn log_event(state_dir: &Path, stack: &str, provenance: bool, event: ProvenanceEvent) {
    if provenance {
        let _ = eventlog::append_event(state_dir, stack, event);
    }
}

/// Record a successful reconciliation into the lock and event log.
fn record_success(
    ctx: &mut RecordCtx<'_>,
    resource_id: &str,
    resource: &Resource,
    artifact: Option<&ArtifactRef>,
    external_id: &str,
    desired_hash: &str,
    duration: f64,
) {
    ctx.lock.resources.insert(
        resource_id.to_string(),
        ResourceLock {
            resource_kind: resource.kind(),
            status: ResourceStatus::Converged,
            applied_at: Some(eventlog::now_iso8601()),
            duration_seconds: Some(duration),
            hash: desired_hash.to_string(),
            handle: Some(external_id.to_string()),
            details: build_resource_details(resource, artifact),
        },
    );

    log_event(
        ctx.state_dir,
        ctx.stack,
        ctx.provenance,
        ProvenanceEvent::ResourceConverged {
            stack: ctx.stack.to_string(),
            resource: resource_id.to_string(),
            duration_seconds: duration,
            hash: desired_hash.to_string(),
        },
    );
}

/// Record a destroy: drop the lock entry, log the event.
fn record_destroy(ctx: &mut RecordCtx<'_>, resource_id: &str) {
    ctx.lock.resources.shift_remove(resource_id);
    log_event(
        ctx.state_dir,
        ctx.stack,
        ctx.provenance,
        ProvenanceEvent::ResourceDestroyed {
            stack: ctx.stack.to_string(),
            resource: resource_id.to_string(),
        },
    );
}

/// Record a resource failure. Returns true if the failure policy says to
/// stop the run.
fn record_failure(
    ctx: &mut RecordCtx<'_>,
    resource_id: &str,
    resource_kind: ResourceKind,
    duration: f64,
    error: &str,
) -> bool {
    ctx.lock.resources.insert(
        resource_id.to_string(),
        ResourceLock {
            resource_kind,
            status: ResourceStatus::Failed,
            applied_at: Some(eventlog::now_iso8601()),
            duration_seconds: Some(duration),
            hash: String::new(),
            handle: None,
            details: indexmap::IndexMap::new(),
        },
    );

    log_event(
        ctx.state_dir,
        ctx.stack,
        ctx.provenance,
        ProvenanceEvent::ResourceFailed {
            stack: ctx.stack.to_string(),
            resource: resource_id.to_string(),
            error: error.to_string(),
        },
    );

    if *ctx.failure_policy == FailurePolicy::StopOnFirst {
        eprintln!(
            "stopping after failure on {}/{}: {}",
            ctx.stack, resource_id, error
        );
        return true;
    }

    false
}

/// Reconcile a single planned change, returning its outcome.
fn apply_single_resource(
    opts: &ApplyOptions<'_>,
    change: &PlannedChange,
    resolved: &StackConfig,
    artifacts: &FxHashMap<String, ArtifactRef>,
    provider: &mut dyn Provider,
    ctx: &mut RecordCtx<'_>,
) -> Result<ResourceOutcome> {
    if let Some(filter) = opts.resource_filter {
        if change.resource_id != filter {
            return Ok(ResourceOutcome::Skipped);
        }
    }

    let resource = match resolved.resources.get(&change.resource_id) {
        Some(r) => r,
        None => return Ok(ResourceOutcome::Skipped),
    };

    // Forcing never resurrects a resource that is both absent and gone
    if change.action == PlanAction::NoOp
        && (!opts.force || resource.presence() == Presence::Absent)
    {
        return Ok(ResourceOutcome::Unchanged);
    }

    log_event(
        ctx.state_dir,
        ctx.stack,
        ctx.provenance,
        ProvenanceEvent::ResourceStarted {
            stack: ctx.stack.to_string(),
            resource: change.resource_id.clone(),
            action: change.action.to_string(),
        },
    );

    let resource_start = Instant::now();

    if change.action == PlanAction::Destroy {
        return match provider.destroy(&change.resource_id) {
            Ok(()) => {
                record_destroy(ctx, &change.resource_id);
                Ok(ResourceOutcome::Destroyed)
            }
            Err(e) => {
                let duration = resource_start.elapsed().as_secs_f64();
                let should_stop = record_failure(
                    ctx,
                    &change.resource_id,
                    resource.kind(),
                    duration,
                    &e.to_string(),
                );
                Ok(ResourceOutcome::Failed { should_stop })
            }
        };
    }

    let artifact = artifacts.get(&change.resource_id);
    let desired_hash = planner::hash_desired_state(resource, artifact);
    let request = ApplyRequest {
        resource_id: &change.resource_id,
        resource,
        artifact,
        desired_hash: &desired_hash,
    };

    match provider.apply(&request) {
        Ok(handle) => {
            let duration = resource_start.elapsed().as_secs_f64();
            record_success(
                ctx,
                &change.resource_id,
                resource,
                artifact,
                &handle.external_id,
                &desired_hash,
                duration,
            );
            Ok(ResourceOutcome::Converged)
        }
        Err(e) => {
            let duration = resource_start.elapsed().as_secs_f64();
            let should_stop = record_failure(
                ctx,
                &change.resource_id,
                resource.kind(),
                duration,
                &e.to_string(),
            );
            Ok(ResourceOutcome::Failed { should_stop })
        }
    }
}

/// Build resource-specific details for the lock entry.
fn build_resource_details(
    resource: &Resource,
    artifact: Option<&ArtifactRef>,
) -> indexmap::IndexMap<String, String> {
    let mut details = indexmap::IndexMap::new();

    match resource {
        Resource::Role(role) => {
            details.insert("trust".to_string(), role.trust.clone());
            details.insert(
                "statements".to_string(),
                role.effective_statements().len().to_string(),
            );
            if !role.managed.is_empty() {
                details.insert("managed".to_string(), role.managed.join(","));
            }
        }
        Resource::Function(function) => {
            details.insert("package".to_string(), function.package.to_string());
            details.insert("timeout".to_string(), function.timeout.to_string());
            details.insert("memory".to_string(), function.memory.to_string());
            if let Some(ref runtime) = function.runtime {
                details.insert("runtime".to_string(), runtime.clone());
            }
            if let Some(ref handler) = function.handler {
                details.insert("handler".to_string(), handler.clone());
            }
            if let Some(artifact) = artifact {
                details.insert("code_digest".to_string(), artifact.digest.clone());
                details.insert("code_locator".to_string(), artifact.locator.clone());
            }
        }
    }

    details
}
