//! Sidecar metadata recording which remote target a cached bundle came from.

use chrono::Utc;
use hgloc_types::config::METADATA_FILENAME;
use hgloc_types::{ArtifactKind, BucketScope, Visibility};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `.hg_localization_bucket_metadata.json`.
///
/// Advisory: a bundle without metadata is still a valid cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub s3_bucket_name: Option<String>,
    pub s3_endpoint_url: Option<String>,
    pub s3_data_prefix: Option<String>,
    /// RFC 3339 UTC timestamp.
    pub cached_timestamp: String,
    pub is_public: bool,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

impl CacheEntryMetadata {
    pub fn new(kind: ArtifactKind, scope: Option<&BucketScope>, visibility: Visibility) -> Self {
        Self {
            s3_bucket_name: scope.map(|s| s.bucket_name.clone()),
            s3_endpoint_url: scope.and_then(|s| s.endpoint_url.clone()),
            s3_data_prefix: scope.and_then(|s| s.data_prefix.clone()),
            cached_timestamp: Utc::now().to_rfc3339(),
            is_public: visibility.is_public(),
            kind,
        }
    }

    /// Bucket, endpoint and prefix all equal the scope's.
    pub fn matches_scope(&self, scope: &BucketScope) -> bool {
        self.s3_bucket_name.as_deref() == Some(scope.bucket_name.as_str())
            && normalize(self.s3_endpoint_url.as_deref()) == scope.endpoint()
            && normalize_prefix(self.s3_data_prefix.as_deref()) == scope.data_prefix()
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_public_flag(self.is_public)
    }
}

/// Sidecar location for a bundle directory.
pub fn metadata_path(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(METADATA_FILENAME)
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_prefix(value: Option<&str>) -> Option<&str> {
    value.map(|v| v.trim_matches('/')).filter(|v| !v.is_empty())
}
