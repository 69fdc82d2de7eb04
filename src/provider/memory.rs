//! In-memory control plane for tests and offline runs.
//!
//! Counts create/update/destroy calls so idempotency is observable: a
//! second apply of an unchanged descriptor must add zero create calls.

use super::{cloud_name, invocation_payload, ApplyRequest, Provider, ResourceHandle, ResourceState};
use crate::core::types::ResourceKind;
use crate::error::{LanzarError, Result};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
struct StoredRecord {
    external_id: String,
    kind: ResourceKind,
    hash: String,
    name: String,
}

/// A control plane that lives in memory.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: IndexMap<String, StoredRecord>,
    pub create_calls: u32,
    pub update_calls: u32,
    pub destroy_calls: u32,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resource ids in the order they were first materialized.
    pub fn resource_ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}

impl Provider for MemoryProvider {
    fn current_state(&self, resource_id: &str) -> Result<Option<ResourceState>> {
        Ok(self.records.get(resource_id).map(|r| ResourceState {
            external_id: r.external_id.clone(),
            kind: r.kind,
            hash: r.hash.clone(),
        }))
    }

    fn apply(&mut self, request: &ApplyRequest<'_>) -> Result<ResourceHandle> {
        let name = cloud_name(request.resource, request.resource_id).to_string();
        let kind = request.resource.kind();
        let external_id = format!("mem:{}/{}", kind, name);

        if self.records.contains_key(request.resource_id) {
            self.update_calls += 1;
        } else {
            self.create_calls += 1;
        }

        self.records.insert(
            request.resource_id.to_string(),
            StoredRecord {
                external_id: external_id.clone(),
                kind,
                hash: request.desired_hash.to_string(),
                name,
            },
        );

        Ok(ResourceHandle {
            resource_id: request.resource_id.to_string(),
            external_id,
        })
    }

    fn destroy(&mut self, resource_id: &str) -> Result<()> {
        if self.records.shift_remove(resource_id).is_some() {
            self.destroy_calls += 1;
        }
        Ok(())
    }

    fn invoke(&self, function_id: &str, _event: &serde_json::Value) -> Result<serde_json::Value> {
        let record = self.records.get(function_id).ok_or_else(|| {
            LanzarError::provider(function_id, "function is not deployed")
        })?;
        if record.kind != ResourceKind::Function {
            return Err(LanzarError::provider(
                function_id,
                format!("cannot invoke a {} resource", record.kind),
            ));
        }
        Ok(invocation_payload(&record.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FunctionSpec, PackageSpec, Presence, Resource, RoleSpec};
    use serde_json::json;

    fn role() -> Resource {
        Resource::Role(RoleSpec {
            name: None,
            trust: "lambda.amazonaws.com".to_string(),
            statements: vec![],
            managed: vec![],
            depends_on: vec![],
            state: Presence::Present,
        })
    }

    fn function() -> Resource {
        Resource::Function(FunctionSpec {
            name: Some("fetch-from-zip".to_string()),
            role: "exec-role".to_string(),
            package: PackageSpec::Archive {
                path: "dist/a.zip".to_string(),
            },
            handler: Some("a.handler".to_string()),
            runtime: Some("python3.12".to_string()),
            timeout: 10,
            memory: 128,
            environment: indexmap::IndexMap::new(),
            depends_on: vec![],
            state: Presence::Present,
        })
    }

    fn request<'a>(id: &'a str, resource: &'a Resource, hash: &'a str) -> ApplyRequest<'a> {
        ApplyRequest {
            resource_id: id,
            resource,
            artifact: None,
            desired_hash: hash,
        }
    }

    #[test]
    fn test_memory_create_then_update() {
        let mut provider = MemoryProvider::new();
        let r = role();

        provider.apply(&request("exec-role", &r, "blake3:v1")).unwrap();
        assert_eq!(provider.create_calls, 1);
        assert_eq!(provider.update_calls, 0);

        provider.apply(&request("exec-role", &r, "blake3:v2")).unwrap();
        assert_eq!(provider.create_calls, 1);
        assert_eq!(provider.update_calls, 1);
    }

    #[test]
    fn test_memory_current_state() {
        let mut provider = MemoryProvider::new();
        assert!(provider.current_state("exec-role").unwrap().is_none());

        let r = role();
        provider.apply(&request("exec-role", &r, "blake3:v1")).unwrap();
        let state = provider.current_state("exec-role").unwrap().unwrap();
        assert_eq!(state.hash, "blake3:v1");
        assert_eq!(state.kind, ResourceKind::Role);
        assert_eq!(state.external_id, "mem:role/exec-role");
    }

    #[test]
    fn test_memory_destroy_idempotent() {
        let mut provider = MemoryProvider::new();
        let r = role();
        provider.apply(&request("exec-role", &r, "blake3:v1")).unwrap();

        provider.destroy("exec-role").unwrap();
        assert_eq!(provider.destroy_calls, 1);
        assert!(provider.current_state("exec-role").unwrap().is_none());

        // Missing resource — still Ok, counter unchanged
        provider.destroy("exec-role").unwrap();
        assert_eq!(provider.destroy_calls, 1);
    }

    #[test]
    fn test_memory_invoke_fixed_shape() {
        let mut provider = MemoryProvider::new();
        let f = function();
        provider.apply(&request("fetch-zip", &f, "blake3:v1")).unwrap();

        // Any well-formed event: same fixed-shape payload, never an error
        for event in [json!({}), json!({"key": "value"}), json!([1, 2, 3])] {
            let payload = provider.invoke("fetch-zip", &event).unwrap();
            assert!(payload["Status"].is_string());
        }
    }

    #[test]
    fn test_memory_invoke_not_deployed() {
        let provider = MemoryProvider::new();
        let result = provider.invoke("ghost", &json!({}));
        assert!(matches!(result, Err(LanzarError::Provider { .. })));
    }

    #[test]
    fn test_memory_invoke_role_rejected() {
        let mut provider = MemoryProvider::new();
        let r = role();
        provider.apply(&request("exec-role", &r, "blake3:v1")).unwrap();
        let result = provider.invoke("exec-role", &json!({}));
        assert!(matches!(result, Err(LanzarError::Provider { .. })));
    }
}
