//! Object Store Client: the credential-gated view of one bucket scope.
//!
//! Wraps an [`ObjectStore`] with the tree-level operations the cache needs.
//! Every method converts remote failures into log lines plus a negative
//! result; nothing here panics or propagates a transport error to the
//! orchestrator except where a caller must distinguish "absent" from "failed".

use anyhow::{anyhow, Result};
use hgloc_types::{relative_key, BucketScope, CacheConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::object_store::{ObjectStore, PutOptions};
use crate::s3::S3ObjectStore;

/// Outcome of [`ObjectStoreClient::upload_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    /// Keys whose upload failed.
    pub failed: Vec<String>,
}

impl UploadReport {
    /// At least one file uploaded and none failed.
    pub fn is_complete(&self) -> bool {
        self.uploaded > 0 && self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    scope: BucketScope,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("scope", &self.scope)
            .finish()
    }
}

impl ObjectStoreClient {
    /// Build an S3-backed client from `config`.
    ///
    /// `None` when no bucket or incomplete credentials are configured
    /// (anonymous mode), or when the bucket probe fails.
    pub fn construct(config: &CacheConfig) -> Option<Self> {
        let scope = config.bucket_scope()?;
        let credentials = match config.credentials.as_ref() {
            Some(creds) if creds.is_complete() => creds,
            _ => {
                debug!(bucket = %scope.bucket_name, "no credentials configured, remote tiers are anonymous-only");
                return None;
            }
        };
        let store = match S3ObjectStore::new(scope, credentials, &config.region) {
            Ok(store) => store,
            Err(e) => {
                warn!(bucket = %scope.bucket_name, error = %e, "failed to build S3 client");
                return None;
            }
        };
        Self::from_store(Arc::new(store), scope.clone())
    }

    /// Wrap an existing store, probing its bucket first.
    pub fn from_store(store: Arc<dyn ObjectStore>, scope: BucketScope) -> Option<Self> {
        match store.probe_bucket() {
            Ok(()) => {
                info!(bucket = %scope.bucket_name, endpoint = ?scope.endpoint_url, "object store client ready");
                Some(Self { store, scope })
            }
            Err(e) => {
                warn!(bucket = %scope.bucket_name, error = %e, "bucket probe failed, remote unavailable");
                None
            }
        }
    }

    pub fn scope(&self) -> &BucketScope {
        &self.scope
    }

    pub fn bucket(&self) -> &str {
        &self.scope.bucket_name
    }

    pub fn data_prefix(&self) -> Option<&str> {
        self.scope.data_prefix()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// `Ok(false)` for a missing key, `Err` for any other failure.
    pub fn head_exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.store.head(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn object_exists(&self, key: &str) -> bool {
        match self.head_exists(key) {
            Ok(found) => found,
            Err(e) => {
                warn!(bucket = %self.bucket(), key, error = %e, "head failed, treating object as absent");
                false
            }
        }
    }

    /// True as soon as one of `keys` exists.
    pub fn object_exists_any<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|key| self.object_exists(key.as_ref()))
    }

    /// True if any marker file exists directly under `key_prefix`.
    pub fn markers_exist<S: AsRef<str>>(&self, key_prefix: &str, markers: &[S]) -> bool {
        let keys: Vec<String> = markers
            .iter()
            .map(|m| join_key(key_prefix, m.as_ref()))
            .collect();
        self.object_exists_any(&keys)
    }

    /// Upload every file under `local_dir` to `key_prefix/<relative path>`.
    ///
    /// Per-file failures are logged and collected; the remaining files are
    /// still transferred and nothing already uploaded is rolled back.
    pub fn upload_tree(&self, local_dir: &Path, key_prefix: &str) -> Result<UploadReport> {
        if !local_dir.is_dir() {
            return Err(anyhow!("{} is not a directory", local_dir.display()));
        }
        let mut report = UploadReport::default();
        for entry in WalkDir::new(local_dir).min_depth(1) {
            let entry = entry.map_err(|e| anyhow!("Failed to walk {}: {}", local_dir.display(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_key(local_dir, entry.path()) else {
                continue;
            };
            let key = join_key(key_prefix, &relative);
            match self.store.put_file(&key, entry.path(), &PutOptions::default()) {
                Ok(()) => {
                    debug!(bucket = %self.bucket(), key = %key, "uploaded file");
                    report.uploaded += 1;
                }
                Err(e) => {
                    warn!(bucket = %self.bucket(), key = %key, error = %e, "failed to upload file");
                    report.failed.push(key);
                }
            }
        }
        info!(
            bucket = %self.bucket(),
            prefix = key_prefix,
            uploaded = report.uploaded,
            failed = report.failed.len(),
            "upload finished"
        );
        Ok(report)
    }

    /// Download every object under `key_prefix/` into `local_dir`.
    ///
    /// Directory-marker keys (ending in `/`) are skipped. Returns false on any
    /// error or when no file was written.
    pub fn download_tree(&self, key_prefix: &str, local_dir: &Path) -> bool {
        match self.try_download_tree(key_prefix, local_dir) {
            Ok(0) => {
                warn!(bucket = %self.bucket(), prefix = key_prefix, "no files downloaded");
                false
            }
            Ok(files) => {
                info!(bucket = %self.bucket(), prefix = key_prefix, files, "download finished");
                true
            }
            Err(e) => {
                warn!(bucket = %self.bucket(), prefix = key_prefix, error = %e, "download failed");
                false
            }
        }
    }

    fn try_download_tree(&self, key_prefix: &str, local_dir: &Path) -> Result<usize> {
        let list_prefix = format!("{}/", key_prefix.trim_end_matches('/'));
        std::fs::create_dir_all(local_dir)
            .map_err(|e| anyhow!("Failed to create {}: {}", local_dir.display(), e))?;

        let mut files = 0;
        let mut token: Option<String> = None;
        loop {
            let page = self.store.list_page(&list_prefix, None, token.as_deref())?;
            for object in &page.objects {
                if object.key.ends_with('/') {
                    continue;
                }
                let relative = &object.key[list_prefix.len()..];
                let relative_path = Path::new(relative);
                if relative_path
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
                {
                    warn!(key = %object.key, "skipping object with unsafe relative path");
                    continue;
                }
                self.store
                    .get_to_file(&object.key, &local_dir.join(relative_path))?;
                files += 1;
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(files)
    }

    /// Immediate child prefixes of `prefix` (each ending in `/`), all pages.
    pub fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut prefixes = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.store.list_page(prefix, Some("/"), token.as_deref())?;
            prefixes.extend(page.common_prefixes);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(prefixes)
    }

    /// Presigned GET URL, only if the object exists.
    pub fn presigned_url(&self, key: &str, ttl: Duration) -> Option<String> {
        match self.head_exists(key) {
            Ok(true) => {}
            Ok(false) => {
                debug!(bucket = %self.bucket(), key, "no object to presign");
                return None;
            }
            Err(e) => {
                warn!(bucket = %self.bucket(), key, error = %e, "head failed before presign");
                return None;
            }
        }
        match self.store.presign_get(key, ttl) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(bucket = %self.bucket(), key, error = %e, "failed to presign");
                None
            }
        }
    }

    /// Fetch and parse a JSON object.
    ///
    /// A missing key and an unparsable body both yield `Ok(None)`; any other
    /// failure is returned so callers can refuse to overwrite what they could
    /// not read.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let bytes = match self.store.get(key) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(bucket = %self.bucket(), key, error = %e, "corrupt JSON object, treating as absent");
                Ok(None)
            }
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T, public_read: bool) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Service(format!("failed to serialize {}: {}", key, e)))?;
        let mut options = PutOptions::json();
        options.public_read = public_read;
        self.store.put(key, body, &options)
    }

    pub fn put_file(&self, key: &str, path: &Path, public_read: bool) -> Result<(), StoreError> {
        let options = PutOptions {
            content_type: None,
            public_read,
        };
        self.store.put_file(key, path, &options)
    }

    pub fn download_object(&self, key: &str, dest: &Path) -> Result<u64, StoreError> {
        self.store.get_to_file(key, dest)
    }
}

/// `prefix/name` with exactly one slash between them.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
