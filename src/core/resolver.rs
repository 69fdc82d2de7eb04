//! Template resolution and dependency order.
//!
//! Resolves `{{params.key}}` templates in string attributes, then builds a
//! DAG from explicit `depends_on` edges plus the implicit Role → Function
//! edge of every role reference. Application order is computed with Kahn's
//! algorithm; ties are broken by declaration order, so the order is stable
//! across runs of the same descriptor.

use super::types::*;
use crate::error::{LanzarError, Result, ValidationError};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Resolve all `{{params.key}}` placeholders in a string.
pub fn resolve_template(template: &str, params: &IndexMap<String, String>) -> Result<String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| LanzarError::Template(format!("unclosed template at position {}", open)))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let param_key = key.strip_prefix("params.").ok_or_else(|| {
            LanzarError::Template(format!("unknown template variable: {}", key))
        })?;
        let value = params
            .get(param_key)
            .ok_or_else(|| LanzarError::Template(format!("unknown param: {}", param_key)))?;

        result.replace_range(open..close, value);
        start = open + value.len();
    }

    Ok(result)
}

fn resolve_opt(opt: &mut Option<String>, params: &IndexMap<String, String>) -> Result<()> {
    if let Some(value) = opt.take() {
        *opt = Some(resolve_template(&value, params)?);
    }
    Ok(())
}

fn resolve_vec(values: &mut [String], params: &IndexMap<String, String>) -> Result<()> {
    for value in values.iter_mut() {
        *value = resolve_template(value, params)?;
    }
    Ok(())
}

/// Resolve all templates in a resource's string attributes. Role references
/// are never templated — the reference graph must be static.
pub fn resolve_resource_templates(
    resource: &Resource,
    params: &IndexMap<String, String>,
) -> Result<Resource> {
    let mut resolved = resource.clone();

    match &mut resolved {
        Resource::Role(role) => {
            resolve_opt(&mut role.name, params)?;
            role.trust = resolve_template(&role.trust, params)?;
            resolve_vec(&mut role.managed, params)?;
            for statement in &mut role.statements {
                resolve_vec(&mut statement.actions, params)?;
                resolve_vec(&mut statement.resources, params)?;
            }
        }
        Resource::Function(function) => {
            resolve_opt(&mut function.name, params)?;
            resolve_opt(&mut function.handler, params)?;
            resolve_opt(&mut function.runtime, params)?;
            for value in function.environment.values_mut() {
                *value = resolve_template(value, params)?;
            }
            match &mut function.package {
                PackageSpec::Archive { path } => {
                    *path = resolve_template(path, params)?;
                }
                PackageSpec::Image { context, cmd } => {
                    *context = resolve_template(context, params)?;
                    resolve_vec(cmd, params)?;
                }
            }
        }
    }

    Ok(resolved)
}

/// Resolve templates across a whole config.
pub fn resolve_config(config: &StackConfig) -> Result<StackConfig> {
    let mut resolved = config.clone();
    for (_, resource) in resolved.resources.iter_mut() {
        *resource = resolve_resource_templates(resource, &config.params)?;
    }
    Ok(resolved)
}

/// Build a topological application order from the reference graph.
/// Every resource is ordered after everything it references; ties are
/// broken by declaration order.
pub fn build_execution_order(config: &StackConfig) -> Result<Vec<String>> {
    let ids: Vec<&str> = config.resources.keys().map(String::as_str).collect();
    let decl_index: FxHashMap<&str, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut in_degree: FxHashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut adjacency: FxHashMap<&str, Vec<&str>> =
        ids.iter().map(|id| (*id, Vec::new())).collect();

    for (id, resource) in &config.resources {
        for dep in resource.references() {
            if !config.resources.contains_key(dep) {
                return Err(LanzarError::Validation(vec![ValidationError::resource(
                    id.clone(),
                    format!("references unknown resource '{}'", dep),
                )]));
            }
            if let Some(neighbors) = adjacency.get_mut(dep) {
                neighbors.push(id.as_str());
            }
            if let Some(degree) = in_degree.get_mut(id.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_by_key(|id| decl_index[id]);
    let mut queue: VecDeque<&str> = ready.into_iter().collect();

    let mut order: Vec<String> = Vec::with_capacity(ids.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());

        let mut next_ready: Vec<&str> = Vec::new();
        if let Some(neighbors) = adjacency.get(current) {
            for &neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor);
                    }
                }
            }
        }
        next_ready.sort_by_key(|id| decl_index[id]);
        for id in next_ready {
            queue.push_back(id);
        }
    }

    if order.len() != ids.len() {
        let members: Vec<String> = ids
            .iter()
            .filter(|id| !order.iter().any(|o| o == *id))
            .map(|id| id.to_string())
            .collect();
        return Err(LanzarError::Cycle { members });
    }

    Ok(order)
}
