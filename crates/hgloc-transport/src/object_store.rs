//! Blocking object store abstraction.

use std::path::Path;
use std::time::Duration;

use crate::error::StoreError;

/// Size and content type of an existing object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub content_type: Option<String>,
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// One page of a `list_page` call.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Prefixes rolled up by the delimiter, each ending with it.
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

/// Options for uploads.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// Grant anonymous read access (canned `public-read` ACL).
    pub public_read: bool,
}

impl PutOptions {
    pub fn json() -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            public_read: false,
        }
    }

    pub fn public(mut self) -> Self {
        self.public_read = true;
        self
    }
}

/// A single bucket of an S3-compatible store.
///
/// All calls block. Missing keys surface as [`StoreError::NotFound`].
pub trait ObjectStore: Send + Sync {
    /// Bucket this store operates on.
    fn bucket(&self) -> &str;

    fn head(&self, key: &str) -> Result<ObjectHead, StoreError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError>;

    /// Upload a local file.
    fn put_file(&self, key: &str, path: &Path, options: &PutOptions) -> Result<(), StoreError> {
        let body = std::fs::read(path)?;
        self.put(key, body, options)
    }

    /// Download an object into a local file, creating parent directories.
    /// Returns the number of bytes written.
    fn get_to_file(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        let body = self.get(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &body)?;
        Ok(body.len() as u64)
    }

    fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    /// Time-limited GET URL for a private object.
    fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;

    /// Cheap call verifying the bucket exists and the credentials can reach it.
    fn probe_bucket(&self) -> Result<(), StoreError>;
}
