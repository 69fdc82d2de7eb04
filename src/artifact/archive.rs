//! Archive building — deterministic zip of a source directory.
//!
//! Entries are written in sorted path order with a fixed timestamp, so the
//! same tree always produces the same archive bytes and therefore the same
//! digest.

use super::ArtifactRef;
use crate::error::{LanzarError, Result};
use glob::Pattern;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip `source_dir` into `output`, skipping paths matching any exclude
/// pattern (matched against the forward-slash relative path). Returns the
/// artifact for the written archive.
pub fn build_archive(source_dir: &Path, output: &Path, excludes: &[String]) -> Result<ArtifactRef> {
    if !source_dir.is_dir() {
        return Err(LanzarError::Artifact(format!(
            "source directory {} does not exist",
            source_dir.display()
        )));
    }

    let patterns = compile_patterns(excludes)?;
    let entries = collect_entries(source_dir, output, &patterns)?;
    if entries.is_empty() {
        return Err(LanzarError::Artifact(format!(
            "no files to package under {}",
            source_dir.display()
        )));
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LanzarError::io(format!("cannot create {}", parent.display()), e))?;
    }
    let file = std::fs::File::create(output)
        .map_err(|e| LanzarError::io(format!("cannot create {}", output.display()), e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for (rel, full) in &entries {
        writer
            .start_file(rel.as_str(), options)
            .map_err(|e| LanzarError::Artifact(format!("zip entry {}: {}", rel, e)))?;
        let bytes = std::fs::read(full)
            .map_err(|e| LanzarError::io(format!("cannot read {}", full.display()), e))?;
        writer
            .write_all(&bytes)
            .map_err(|e| LanzarError::io(format!("cannot write {}", output.display()), e))?;
    }

    writer
        .finish()
        .map_err(|e| LanzarError::Artifact(format!("zip finalize: {}", e)))?;

    Ok(ArtifactRef {
        digest: super::sha256_file(output)?,
        locator: output.display().to_string(),
    })
}

fn compile_patterns(excludes: &[String]) -> Result<Vec<Pattern>> {
    excludes
        .iter()
        .map(|e| {
            Pattern::new(e)
                .map_err(|err| LanzarError::Artifact(format!("bad exclude pattern '{}': {}", e, err)))
        })
        .collect()
}

/// Sorted (relative, absolute) file pairs under `source_dir`, minus
/// excluded paths, symlinks, and the output archive itself.
fn collect_entries(
    source_dir: &Path,
    output: &Path,
    patterns: &[Pattern],
) -> Result<Vec<(String, PathBuf)>> {
    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    let mut pending: Vec<PathBuf> = vec![source_dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let read_dir = std::fs::read_dir(&current)
            .map_err(|e| LanzarError::io(format!("cannot read dir {}", current.display()), e))?;
        for entry in read_dir.filter_map(|e| e.ok()) {
            let ft = entry
                .file_type()
                .map_err(|e| LanzarError::io(format!("stat error {}", entry.path().display()), e))?;
            if ft.is_symlink() {
                continue;
            }
            let full = entry.path();
            if full == output {
                continue;
            }
            let rel = full
                .strip_prefix(source_dir)
                .map_err(|_| LanzarError::Artifact(format!("path escape: {}", full.display())))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if patterns.iter().any(|p| p.matches(&rel)) {
                continue;
            }
            if ft.is_file() {
                entries.push((rel, full));
            } else if ft.is_dir() {
                pending.push(full);
            }
        }
    }

    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(dir: &Path) {
        std::fs::write(dir.join("handler.py"), "def handler(): pass").unwrap();
        std::fs::create_dir(dir.join("lib")).unwrap();
        std::fs::write(dir.join("lib/util.py"), "X = 1").unwrap();
        std::fs::write(dir.join("notes.md"), "scratch").unwrap();
    }

    #[test]
    fn test_archive_build() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_source(&src);

        let output = dir.path().join("dist/handler.zip");
        let artifact = build_archive(&src, &output, &[]).unwrap();
        assert!(output.exists());
        assert!(artifact.digest.starts_with("sha256:"));
        assert!(artifact.locator.ends_with("handler.zip"));
    }

    #[test]
    fn test_archive_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_source(&src);

        let a1 = build_archive(&src, &dir.path().join("one.zip"), &[]).unwrap();
        let a2 = build_archive(&src, &dir.path().join("two.zip"), &[]).unwrap();
        assert_eq!(a1.digest, a2.digest);
    }

    #[test]
    fn test_archive_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_source(&src);

        let all = build_archive(&src, &dir.path().join("all.zip"), &[]).unwrap();
        let trimmed = build_archive(
            &src,
            &dir.path().join("trimmed.zip"),
            &["*.md".to_string()],
        )
        .unwrap();
        assert_ne!(all.digest, trimmed.digest);
    }

    #[test]
    fn test_archive_exclude_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_source(&src);

        let trimmed = build_archive(
            &src,
            &dir.path().join("nolib.zip"),
            &["lib".to_string(), "lib/*".to_string()],
        )
        .unwrap();
        let all = build_archive(&src, &dir.path().join("all.zip"), &[]).unwrap();
        assert_ne!(all.digest, trimmed.digest);
    }

    #[test]
    fn test_archive_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_archive(&dir.path().join("ghost"), &dir.path().join("out.zip"), &[]);
        assert!(matches!(result, Err(LanzarError::Artifact(_))));
    }

    #[test]
    fn test_archive_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        let result = build_archive(&src, &dir.path().join("out.zip"), &[]);
        assert!(matches!(result, Err(LanzarError::Artifact(_))));
    }

    #[test]
    fn test_archive_bad_exclude_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_source(&src);
        let result = build_archive(&src, &dir.path().join("out.zip"), &["[".to_string()]);
        assert!(result.is_err());
    }
}
