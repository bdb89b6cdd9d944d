//! Local cache store: bundle directories plus their sidecar metadata.

use anyhow::{anyhow, Result};
use hgloc_types::{ArtifactKind, BucketScope, CacheConfig, Visibility};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bundle::ArtifactBundle;
use crate::metadata::{metadata_path, CacheEntryMetadata};
use crate::paths::atomic_write_json;

/// Trait for local bundle stores.
pub trait BundleStore: Send + Sync {
    /// `path` exists and at least one marker file of `kind` sits directly under it.
    fn exists(&self, kind: ArtifactKind, path: &Path) -> bool;

    /// Materialize `bundle` at `path`. Callers check [`BundleStore::exists`] first.
    fn write_bundle(&self, path: &Path, bundle: &dyn ArtifactBundle) -> Result<()>;

    /// Read the sidecar; absent or unreadable metadata is `None`.
    fn read_metadata(&self, path: &Path) -> Option<CacheEntryMetadata>;

    /// Write the sidecar. Failures are logged and reported as `false`, never raised.
    fn write_metadata(
        &self,
        path: &Path,
        kind: ArtifactKind,
        scope: Option<&BucketScope>,
        visibility: Visibility,
    ) -> bool;

    /// Whether the bundle at `path` belongs to `scope`.
    fn matches_current_scope(&self, path: &Path, scope: Option<&BucketScope>) -> bool;

    /// Remove a bundle directory recursively. Missing paths are not an error.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Read one UTF-8 file from a cached bundle.
    fn read_text(&self, path: &Path, file: &str) -> Option<String>;
}

/// Filesystem-backed bundle store.
pub struct FsBundleStore {
    config: Arc<CacheConfig>,
}

impl FsBundleStore {
    pub fn new(config: Arc<CacheConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl BundleStore for FsBundleStore {
    fn exists(&self, kind: ArtifactKind, path: &Path) -> bool {
        path.is_dir()
            && self
                .config
                .layout(kind)
                .marker_files
                .iter()
                .any(|marker| path.join(marker).is_file())
    }

    fn write_bundle(&self, path: &Path, bundle: &dyn ArtifactBundle) -> Result<()> {
        std::fs::create_dir_all(path)
            .map_err(|e| anyhow!("Failed to create bundle dir {}: {}", path.display(), e))?;
        bundle.materialize_to(path)?;
        debug!(path = %path.display(), "wrote bundle");
        Ok(())
    }

    fn read_metadata(&self, path: &Path) -> Option<CacheEntryMetadata> {
        let meta_path = metadata_path(path);
        let bytes = std::fs::read(&meta_path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = %meta_path.display(), error = %e, "ignoring unreadable cache metadata");
                None
            }
        }
    }

    fn write_metadata(
        &self,
        path: &Path,
        kind: ArtifactKind,
        scope: Option<&BucketScope>,
        visibility: Visibility,
    ) -> bool {
        let meta = CacheEntryMetadata::new(kind, scope, visibility);
        match atomic_write_json(&metadata_path(path), &meta) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write cache metadata");
                false
            }
        }
    }

    fn matches_current_scope(&self, path: &Path, scope: Option<&BucketScope>) -> bool {
        match (self.read_metadata(path), scope) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(meta), None) => meta.s3_bucket_name.is_none(),
            (Some(meta), Some(scope)) => meta.matches_scope(scope),
        }
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(path)
            .map_err(|e| anyhow!("Failed to remove {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "deleted bundle");
        Ok(())
    }

    fn read_text(&self, path: &Path, file: &str) -> Option<String> {
        let file_path = path.join(file);
        if !file_path.is_file() {
            return None;
        }
        match std::fs::read_to_string(&file_path) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "failed to read cached file");
                None
            }
        }
    }
}
