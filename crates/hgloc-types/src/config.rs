//! Immutable cache configuration.
//!
//! A [`CacheConfig`] is built once (explicitly, or from the environment via
//! [`CacheConfig::from_env`]) and handed to every component. Nothing below the
//! process boundary reads environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env_utils::{env_string, env_string_or, env_var_or};
use crate::identity::{ArtifactKind, BucketScope, Credentials, Visibility};
use crate::naming::PUBLIC_DIR;

/// Default name used when an identity has no variant.
pub const DEFAULT_VARIANT_NAME: &str = "default_config";
/// Default name used when an identity has no revision.
pub const DEFAULT_REVISION_NAME: &str = "default_revision";
/// Sidecar metadata filename written next to every cached bundle.
pub const METADATA_FILENAME: &str = ".hg_localization_bucket_metadata.json";
/// Region used when none is configured. Most S3-compatible stores ignore it.
pub const DEFAULT_REGION: &str = "us-east-1";

const APP_DIR: &str = "hg_localization";
const DATASETS_STORE_DIR: &str = "datasets_store";
const MODELS_STORE_DIR: &str = "models_store";

/// Per-kind key names and marker files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindLayout {
    /// Public manifest key, relative to the data prefix.
    pub manifest_key: String,
    /// Directory of public zips, relative to the data prefix.
    pub public_zip_dir: String,
    /// Private index key, relative to the data prefix.
    pub private_index_key: String,
    /// A bundle is complete when at least one of these sits directly in its root.
    pub marker_files: Vec<String>,
    /// File served as the bundle's card (README-like description).
    pub card_file: String,
}

impl KindLayout {
    pub fn datasets() -> Self {
        Self {
            manifest_key: "public_datasets.json".to_string(),
            public_zip_dir: "public_datasets_zip".to_string(),
            private_index_key: "private_datasets_index.json".to_string(),
            marker_files: vec!["dataset_info.json".to_string(), "dataset_dict.json".to_string()],
            card_file: "dataset_card.md".to_string(),
        }
    }

    pub fn models() -> Self {
        Self {
            manifest_key: "public_models.json".to_string(),
            public_zip_dir: "public_models_zip".to_string(),
            private_index_key: "private_models_index.json".to_string(),
            marker_files: vec!["config.json".to_string(), "model_card.md".to_string()],
            card_file: "model_card.md".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub bucket: Option<BucketScope>,
    pub region: String,
    pub credentials: Option<Credentials>,
    pub datasets_store_path: PathBuf,
    pub models_store_path: PathBuf,
    pub default_variant_name: String,
    pub default_revision_name: String,
    pub datasets: KindLayout,
    pub models: KindLayout,
    /// Timeout for manifest fetches over anonymous HTTP.
    pub http_timeout: Duration,
    /// Timeout for public zip downloads.
    pub download_timeout: Duration,
    /// Lifetime of presigned card URLs.
    pub presign_ttl: Duration,
}

impl CacheConfig {
    /// Local-only configuration rooted at `root`: datasets in
    /// `root/datasets_store`, models in `root/models_store`, no remote.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            bucket: None,
            region: DEFAULT_REGION.to_string(),
            credentials: None,
            datasets_store_path: root.join(DATASETS_STORE_DIR),
            models_store_path: root.join(MODELS_STORE_DIR),
            default_variant_name: DEFAULT_VARIANT_NAME.to_string(),
            default_revision_name: DEFAULT_REVISION_NAME.to_string(),
            datasets: KindLayout::datasets(),
            models: KindLayout::models(),
            http_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(300),
            presign_ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_bucket(mut self, scope: BucketScope) -> Self {
        self.bucket = Some(scope);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Build from `HGLOC_*` environment variables, loading `.env` first if present.
    ///
    /// Unset variables fall back to the defaults of [`CacheConfig::new`] rooted
    /// at `<user cache dir>/hg_localization`.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        let mut config = Self::new(&root);

        if let Some(path) = env_string("HGLOC_DATASETS_STORE_PATH") {
            config.datasets_store_path = PathBuf::from(path);
        }
        if let Some(path) = env_string("HGLOC_MODELS_STORE_PATH") {
            config.models_store_path = PathBuf::from(path);
        }
        config.default_variant_name =
            env_string_or("HGLOC_DEFAULT_CONFIG_NAME", DEFAULT_VARIANT_NAME);
        config.default_revision_name =
            env_string_or("HGLOC_DEFAULT_REVISION_NAME", DEFAULT_REVISION_NAME);
        config.region = env_string_or("HGLOC_S3_REGION", DEFAULT_REGION);
        config.http_timeout = Duration::from_secs(env_var_or("HGLOC_HTTP_TIMEOUT_SECS", 10));

        if let Some(bucket) = env_string("HGLOC_S3_BUCKET_NAME") {
            let endpoint = env_string("HGLOC_S3_ENDPOINT_URL");
            let prefix = env_string("HGLOC_S3_DATA_PREFIX");
            config.bucket = Some(BucketScope::new(bucket, endpoint.as_deref(), prefix.as_deref()));
        }

        if let (Some(ak), Some(sk)) = (
            env_string("HGLOC_AWS_ACCESS_KEY_ID"),
            env_string("HGLOC_AWS_SECRET_ACCESS_KEY"),
        ) {
            config.credentials = Some(Credentials::new(ak, sk));
        }

        tracing::debug!(
            bucket = ?config.bucket.as_ref().map(|b| b.bucket_name.as_str()),
            has_credentials = config.has_credentials(),
            datasets_root = %config.datasets_store_path.display(),
            "loaded cache config from environment"
        );
        config
    }

    pub fn layout(&self, kind: ArtifactKind) -> &KindLayout {
        match kind {
            ArtifactKind::Dataset => &self.datasets,
            ArtifactKind::Model => &self.models,
        }
    }

    /// Root directory of the local store for `kind` at `visibility`.
    pub fn store_root(&self, kind: ArtifactKind, visibility: Visibility) -> PathBuf {
        let private_root = match kind {
            ArtifactKind::Dataset => &self.datasets_store_path,
            ArtifactKind::Model => &self.models_store_path,
        };
        match visibility {
            Visibility::Private => private_root.clone(),
            Visibility::Public => private_root.join(PUBLIC_DIR),
        }
    }

    /// Both a bucket and a complete key pair are configured.
    pub fn has_credentials(&self) -> bool {
        self.bucket.is_some()
            && self
                .credentials
                .as_ref()
                .map(Credentials::is_complete)
                .unwrap_or(false)
    }

    pub fn data_prefix(&self) -> Option<&str> {
        self.bucket.as_ref().and_then(BucketScope::data_prefix)
    }

    pub fn bucket_scope(&self) -> Option<&BucketScope> {
        self.bucket.as_ref()
    }
}
