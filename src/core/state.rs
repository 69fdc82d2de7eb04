//! Lock file management — load, save (atomic), path derivation.

use super::types::StateLock;
use crate::error::{LanzarError, Result};
use std::path::{Path, PathBuf};

/// Derive the lock file path for a stack within the state directory.
pub fn lock_file_path(state_dir: &Path, stack: &str) -> PathBuf {
    state_dir.join(stack).join("state.lock.yaml")
}

/// Load a lock file for a stack. Returns None if the file doesn't exist.
pub fn load_lock(state_dir: &Path, stack: &str) -> Result<Option<StateLock>> {
    let path = lock_file_path(state_dir, stack);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| LanzarError::io(format!("cannot read {}", path.display()), e))?;
    let lock: StateLock = serde_yaml_ng::from_str(&content)?;
    Ok(Some(lock))
}

/// Save a lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &StateLock) -> Result<()> {
    let path = lock_file_path(state_dir, &lock.stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LanzarError::io(format!("cannot create dir {}", parent.display()), e))?;
    }

    let yaml = serde_yaml_ng::to_string(lock)?;

    let tmp_path = path.with_extension("lock.yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| LanzarError::io(format!("cannot write {}", tmp_path.display()), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        LanzarError::io(
            format!("cannot rename {} to {}", tmp_path.display(), path.display()),
            e,
        )
    })?;

    Ok(())
}

/// Create a new empty StateLock for a stack.
pub fn new_lock(stack: &str) -> StateLock {
    use crate::provenance::eventlog::now_iso8601;
    StateLock {
        schema: "1.0".to_string(),
        stack: stack.to_string(),
        generated_at: now_iso8601(),
        generator: format!("lanzar {}", env!("CARGO_PKG_VERSION")),
        resources: indexmap::IndexMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResourceKind, ResourceLock, ResourceStatus};
    use indexmap::IndexMap;

    fn make_lock() -> StateLock {
        let mut resources = IndexMap::new();
        resources.insert(
            "exec-role".to_string(),
            ResourceLock {
                resource_kind: ResourceKind::Role,
                status: ResourceStatus::Converged,
                applied_at: Some("2026-06-01T10:00:00Z".to_string()),
                duration_seconds: Some(0.8),
                hash: "blake3:abc123".to_string(),
                handle: Some("local:role/exec-role".to_string()),
                details: IndexMap::new(),
            },
        );
        StateLock {
            schema: "1.0".to_string(),
            stack: "data-pipeline".to_string(),
            generated_at: "2026-06-01T10:00:00Z".to_string(),
            generator: "lanzar 0.3.1".to_string(),
            resources,
        }
    }

    #[test]
    fn test_state_lock_file_path() {
        let p = lock_file_path(Path::new("/state"), "data-pipeline");
        assert_eq!(p, PathBuf::from("/state/data-pipeline/state.lock.yaml"));
    }

    #[test]
    fn test_state_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let lock = make_lock();
        save_lock(dir.path(), &lock).unwrap();

        let loaded = load_lock(dir.path(), "data-pipeline").unwrap().unwrap();
        assert_eq!(loaded.stack, "data-pipeline");
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(
            loaded.resources["exec-role"].status,
            ResourceStatus::Converged
        );
    }

    #[test]
    fn test_state_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_lock(dir.path(), "ghost").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_state_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let lock = make_lock();
        save_lock(dir.path(), &lock).unwrap();

        let tmp = dir
            .path()
            .join("data-pipeline")
            .join("state.lock.yaml.tmp");
        assert!(!tmp.exists());
        assert!(lock_file_path(dir.path(), "data-pipeline").exists());
    }

    #[test]
    fn test_state_new_lock() {
        let lock = new_lock("data-pipeline");
        assert_eq!(lock.stack, "data-pipeline");
        assert!(lock.generated_at.contains('T'));
        assert!(lock.generator.starts_with("lanzar "));
        assert!(lock.resources.is_empty());
    }

    #[test]
    fn test_state_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = make_lock();
        lock.resources.insert(
            "aaa-first".to_string(),
            ResourceLock {
                resource_kind: ResourceKind::Function,
                status: ResourceStatus::Converged,
                applied_at: None,
                duration_seconds: None,
                hash: "blake3:xxx".to_string(),
                handle: None,
                details: IndexMap::new(),
            },
        );
        save_lock(dir.path(), &lock).unwrap();
        let loaded = load_lock(dir.path(), "data-pipeline").unwrap().unwrap();
        let keys: Vec<_> = loaded.resources.keys().collect();
        assert_eq!(keys, vec!["exec-role", "aaa-first"]);
    }
}
