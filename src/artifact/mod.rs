//! Packaging pipeline surface — content-addressed deployable artifacts.
//!
//! The engine treats an artifact as an opaque input to a function's code
//! attribute. Resolution turns a package spec into a digest plus a locator;
//! the digest feeds the desired-state hash, so a code change alone is enough
//! to flip a function to UPDATE.

pub mod archive;

use crate::core::types::PackageSpec;
use crate::error::{LanzarError, Result};
use crate::provenance::hasher;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// A resolved deployable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Content digest (`sha256:` for archives, `blake3:` for image contexts)
    pub digest: String,

    /// Where the control plane can find the artifact: an archive path or an
    /// image tag
    pub locator: String,
}

/// Resolve a package spec to an artifact. Paths are taken relative to
/// `base_dir` (the directory holding the stack config).
pub fn resolve(package: &PackageSpec, base_dir: &Path) -> Result<ArtifactRef> {
    match package {
        PackageSpec::Archive { path } => resolve_archive(base_dir, path),
        PackageSpec::Image { context, cmd } => resolve_image(base_dir, context, cmd),
    }
}

fn resolve_archive(base_dir: &Path, path: &str) -> Result<ArtifactRef> {
    let full = base_dir.join(path);
    if !full.is_file() {
        return Err(LanzarError::Artifact(format!(
            "archive {} does not exist",
            full.display()
        )));
    }
    Ok(ArtifactRef {
        digest: sha256_file(&full)?,
        locator: full.display().to_string(),
    })
}

fn resolve_image(base_dir: &Path, context: &str, cmd: &[String]) -> Result<ArtifactRef> {
    let full = base_dir.join(context);
    if !full.is_dir() {
        return Err(LanzarError::Artifact(format!(
            "image context {} does not exist",
            full.display()
        )));
    }

    let context_hash = hasher::hash_directory(&full)?;
    let cmd_line = cmd.join(" ");
    let digest = hasher::composite_hash(&[&context_hash, &cmd_line]);

    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "context".to_string());
    let short = digest.trim_start_matches("blake3:");
    let short = &short[..12.min(short.len())];

    Ok(ArtifactRef {
        locator: format!("lanzar/{}:{}", name, short),
        digest,
    })
}

/// Hash a file's contents. Returns `"sha256:{hex}"` — the control-plane
/// convention for function code digests.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| LanzarError::io(format!("cannot open {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| LanzarError::io(format!("read error {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!("sha256:{}", hex))
}
