//! Opaque artifact bundles.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::paths::copy_dir_all;

/// Something that can write its files into a directory.
///
/// The cache treats bundle contents as opaque blobs; only the marker files
/// configured per kind are ever inspected.
pub trait ArtifactBundle: Send + Sync {
    /// Write every file of the bundle under `dest`, creating directories.
    fn materialize_to(&self, dest: &Path) -> Result<()>;
}

/// A directory on disk used as a bundle.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactBundle for DirectoryBundle {
    fn materialize_to(&self, dest: &Path) -> Result<()> {
        if dest.starts_with(&self.root) {
            return Err(anyhow!(
                "Refusing to copy {} into itself ({})",
                self.root.display(),
                dest.display()
            ));
        }
        copy_dir_all(&self.root, dest)?;
        Ok(())
    }
}
