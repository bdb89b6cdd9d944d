//! Caches wired to an in-memory remote.

use hgloc::{ArtifactCache, BucketScope, CacheConfig, Credentials, MemoryObjectStore};
use std::path::Path;
use std::sync::{Arc, Once};
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config rooted at `root` targeting `scope`, with or without credentials.
pub fn remote_config(root: &Path, scope: &BucketScope, credentials: bool) -> CacheConfig {
    let config = CacheConfig::new(root).with_bucket(scope.clone());
    if credentials {
        config.with_credentials(Credentials::new("AKIATEST", "secret"))
    } else {
        config
    }
}

/// One cache directory plus the remote it talks to.
pub struct Harness {
    pub root: TempDir,
    pub remote: Arc<MemoryObjectStore>,
    pub cache: ArtifactCache,
}

impl Harness {
    /// Credentialed cache on a fresh remote for bucket `b1`.
    pub fn new() -> Self {
        Self::for_scope(BucketScope::bucket("b1"))
    }

    pub fn for_scope(scope: BucketScope) -> Self {
        let remote = Arc::new(memory_store_for(&scope));
        Self::attach(&remote, scope, true)
    }

    /// A new cache directory sharing `remote`.
    pub fn attach(remote: &Arc<MemoryObjectStore>, scope: BucketScope, credentials: bool) -> Self {
        init_tracing();
        let root = TempDir::new().expect("temp dir");
        let config = remote_config(root.path(), &scope, credentials);
        let cache = ArtifactCache::builder(config)
            .object_store(remote.clone())
            .public_http(Arc::new(remote.public_gateway()))
            .build();
        Self {
            root,
            remote: remote.clone(),
            cache,
        }
    }

    /// Another cache directory on the same remote and scope.
    pub fn sibling(&self, credentials: bool) -> Self {
        let scope = self
            .cache
            .config()
            .bucket_scope()
            .cloned()
            .expect("harness has a bucket");
        Self::attach(&self.remote, scope, credentials)
    }

    pub fn store_root(&self) -> &Path {
        self.root.path()
    }

    pub fn manifest_json(&self, key: &str) -> serde_json::Value {
        let bytes = self.remote.peek(key).expect("manifest object present");
        serde_json::from_slice(&bytes).expect("manifest is JSON")
    }
}

fn memory_store_for(scope: &BucketScope) -> MemoryObjectStore {
    match scope.endpoint() {
        Some(endpoint) => MemoryObjectStore::with_host(
            scope.bucket_name.clone(),
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/'),
        ),
        None => MemoryObjectStore::new(scope.bucket_name.clone()),
    }
}
