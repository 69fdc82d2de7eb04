//! BLAKE3 hashing of strings, files, directories, and composites.
//!
//! All hashes use the `"blake3:{hex}"` form so a hash value carries its
//! algorithm with it.

use crate::error::{LanzarError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| LanzarError::io(format!("cannot open {}", path.display()), e))?;
    let mut hasher = blake3::Hasher::new();
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
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a directory: sorted walk, relative paths mixed into the hash so
/// renames change it. Symlinks are skipped.
pub fn hash_directory(path: &Path) -> Result<String> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut pending: Vec<PathBuf> = vec![path.to_path_buf()];

    while let Some(current) = pending.pop() {
        let read_dir = std::fs::read_dir(&current)
            .map_err(|e| LanzarError::io(format!("cannot read dir {}", current.display()), e))?;
        let mut children: Vec<std::fs::DirEntry> = read_dir.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            let ft = entry
                .file_type()
                .map_err(|e| LanzarError::io(format!("stat error {}", entry.path().display()), e))?;
            if ft.is_symlink() {
                continue;
            }
            let child = entry.path();
            if ft.is_file() {
                let rel = child
                    .strip_prefix(path)
                    .map_err(|_| LanzarError::Artifact(format!("path escape: {}", child.display())))?
                    .to_string_lossy()
                    .to_string();
                let hash = hash_file(&child)?;
                entries.push((rel, hash));
            } else if ft.is_dir() {
                pending.push(child);
            }
        }
    }

    // The stack walk visits directories in an order that depends on push
    // order; sort the flat entry list so the final hash is deterministic.
    entries.sort();

    let mut hasher = blake3::Hasher::new();
    for (rel, hash) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Compute a composite hash from multiple component strings.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
