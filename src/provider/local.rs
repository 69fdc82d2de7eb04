//! File-backed control plane — one JSON record per resource id under a
//! store directory. Lets the CLI run end-to-end without a cloud account;
//! records survive across runs, which is what makes re-runs idempotent.

use super::{cloud_name, invocation_payload, ApplyRequest, Provider, ResourceHandle, ResourceState};
use crate::core::types::ResourceKind;
use crate::error::{LanzarError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    external_id: String,
    kind: ResourceKind,
    hash: String,
    name: String,
    applied_at: String,
}

/// A control plane persisted to a local directory.
#[derive(Debug)]
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| LanzarError::io(format!("cannot create store {}", root.display()), e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn record_path(&self, resource_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", resource_id))
    }

    fn read_record(&self, resource_id: &str) -> Result<Option<StoredRecord>> {
        let path = self.record_path(resource_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LanzarError::io(format!("cannot read {}", path.display()), e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_record(&self, resource_id: &str, record: &StoredRecord) -> Result<()> {
        let path = self.record_path(resource_id);
        let json = serde_json::to_string_pretty(record)?;

        // Atomic write: temp file + rename
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)
            .map_err(|e| LanzarError::io(format!("cannot write {}", tmp_path.display()), e))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            LanzarError::io(
                format!("cannot rename {} to {}", tmp_path.display(), path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

impl Provider for LocalProvider {
    fn current_state(&self, resource_id: &str) -> Result<Option<ResourceState>> {
        Ok(self.read_record(resource_id)?.map(|r| ResourceState {
            external_id: r.external_id,
            kind: r.kind,
            hash: r.hash,
        }))
    }

    fn apply(&mut self, request: &ApplyRequest<'_>) -> Result<ResourceHandle> {
        let name = cloud_name(request.resource, request.resource_id).to_string();
        let kind = request.resource.kind();
        let external_id = format!("local:{}/{}", kind, name);

        self.write_record(
            request.resource_id,
            &StoredRecord {
                external_id: external_id.clone(),
                kind,
                hash: request.desired_hash.to_string(),
                name,
                applied_at: crate::provenance::eventlog::now_iso8601(),
            },
        )?;

        Ok(ResourceHandle {
            resource_id: request.resource_id.to_string(),
            external_id,
        })
    }

    fn destroy(&mut self, resource_id: &str) -> Result<()> {
        let path = self.record_path(resource_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LanzarError::io(
                format!("cannot remove {}", path.display()),
                e,
            )),
        }
    }

    fn invoke(&self, function_id: &str, _event: &serde_json::Value) -> Result<serde_json::Value> {
        let record = self
            .read_record(function_id)?
            .ok_or_else(|| LanzarError::provider(function_id, "function is not deployed"))?;
        if record.kind != ResourceKind::Function {
            return Err(LanzarError::provider(
                function_id,
                format!("cannot invoke a {} resource", record.kind),
            ));
        }
        Ok(invocation_payload(&record.name))
    }
}
