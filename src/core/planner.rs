//! Plan generation — diff desired state against the control plane.

use super::types::*;
use crate::artifact::ArtifactRef;
use crate::error::Result;
use crate::provenance::hasher;
use crate::provider::{cloud_name, Provider, ResourceState};
use rustc_hash::FxHashMap;

/// Query the provider for the current state of every declared resource,
/// through the narrow interface only.
pub fn current_states(
    provider: &dyn Provider,
    config: &StackConfig,
) -> Result<FxHashMap<String, ResourceState>> {
    let mut current = FxHashMap::default();
    for id in config.resources.keys() {
        if let Some(state) = provider.current_state(id)? {
            current.insert(id.clone(), state);
        }
    }
    Ok(current)
}

/// Generate an execution plan by comparing desired config to current state.
pub fn plan(
    config: &StackConfig,
    execution_order: &[String],
    artifacts: &FxHashMap<String, ArtifactRef>,
    current: &FxHashMap<String, ResourceState>,
) -> ExecutionPlan {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;

    for resource_id in execution_order {
        let resource = match config.resources.get(resource_id) {
            Some(r) => r,
            None => continue,
        };

        let artifact = artifacts.get(resource_id);
        let desired_hash = hash_desired_state(resource, artifact);
        let action = determine_action(resource_id, resource, &desired_hash, current);
        let description = describe_action(resource_id, resource, artifact, &action);

        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::Destroy => to_destroy += 1,
            PlanAction::NoOp => unchanged += 1,
        }

        changes.push(PlannedChange {
            resource_id: resource_id.clone(),
            resource_kind: resource.kind(),
            action,
            description,
        });
    }

    ExecutionPlan {
        name: config.name.clone(),
        changes,
        execution_order: execution_order.to_vec(),
        to_create,
        to_update,
        to_destroy,
        unchanged,
    }
}

/// Determine what action to take for a resource.
fn determine_action(
    resource_id: &str,
    resource: &Resource,
    desired_hash: &str,
    current: &FxHashMap<String, ResourceState>,
) -> PlanAction {
    if resource.presence() == Presence::Absent {
        return if current.contains_key(resource_id) {
            PlanAction::Destroy
        } else {
            PlanAction::NoOp
        };
    }

    match current.get(resource_id) {
        None => PlanAction::Create,
        Some(state) if state.hash == desired_hash => PlanAction::NoOp,
        Some(_) => PlanAction::Update,
    }
}

/// Compute the desired-state hash of a resource. For functions the
/// artifact digest is mixed in, so a code change alone triggers UPDATE.
pub fn hash_desired_state(resource: &Resource, artifact: Option<&ArtifactRef>) -> String {
    let mut components: Vec<String> = vec![resource.kind().to_string()];

    match resource {
        Resource::Role(role) => {
            components.push(role.name.clone().unwrap_or_default());
            components.push(role.trust.clone());
            for statement in role.effective_statements() {
                components.push(match statement.effect {
                    Effect::Allow => "allow".to_string(),
                    Effect::Deny => "deny".to_string(),
                });
                components.extend(statement.actions.iter().cloned());
                components.extend(statement.resources.iter().cloned());
            }
            components.extend(role.managed.iter().cloned());
        }
        Resource::Function(function) => {
            components.push(function.name.clone().unwrap_or_default());
            components.push(function.role.clone());
            components.push(function.package.to_string());
            components.push(function.handler.clone().unwrap_or_default());
            components.push(function.runtime.clone().unwrap_or_default());
            components.push(function.timeout.to_string());
            components.push(function.memory.to_string());
            for (key, value) in &function.environment {
                components.push(format!("{}={}", key, value));
            }
        }
    }

    if let Some(artifact) = artifact {
        components.push(artifact.digest.clone());
    }

    let refs: Vec<&str> = components.iter().map(String::as_str).collect();
    hasher::composite_hash(&refs)
}

/// Generate a human-readable description of a planned action.
fn describe_action(
    resource_id: &str,
    resource: &Resource,
    artifact: Option<&ArtifactRef>,
    action: &PlanAction,
) -> String {
    match action {
        PlanAction::Create => match resource {
            Resource::Role(role) => format!(
                "{}: create role {} (trust {})",
                resource_id,
                cloud_name(resource, resource_id),
                role.trust
            ),
            Resource::Function(_) => {
                let source = artifact.map(|a| a.locator.as_str()).unwrap_or("?");
                format!(
                    "{}: deploy function {} from {}",
                    resource_id,
                    cloud_name(resource, resource_id),
                    source
                )
            }
        },
        PlanAction::Update => format!("{}: update (desired state changed)", resource_id),
        PlanAction::Destroy => format!("{}: destroy", resource_id),
        PlanAction::NoOp => format!("{}: no changes", resource_id),
    }
}
