//! Filesystem helpers: atomic writes and recursive copies.

use anyhow::{anyhow, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to .tmp, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a JSON file atomically (pretty-printed, human-inspectable sidecars).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}

/// Recursively copy the contents of `src` into `dest`, creating directories.
///
/// Existing files in `dest` are overwritten. Returns the number of files copied.
pub fn copy_dir_all(src: &Path, dest: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(anyhow!("Source {} is not a directory", src.display()));
    }
    std::fs::create_dir_all(dest)
        .map_err(|e| anyhow!("Failed to create directory {}: {}", dest.display(), e))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| anyhow!("Failed to walk {}: {}", src.display(), e))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| anyhow!("Path {} escapes {}: {}", entry.path().display(), src.display(), e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| anyhow!("Failed to create directory {}: {}", target.display(), e))?;
        } else {
            ensure_parent_dirs(&target)?;
            std::fs::copy(entry.path(), &target).map_err(|e| {
                anyhow!(
                    "Failed to copy {} to {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}
