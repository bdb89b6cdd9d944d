//! Public Manifest Synchronizer and private index.
//!
//! The manifest is one public-read JSON object per kind mapping
//! `"{namespace}---{variant}---{revision}"` to the zip that holds the bundle.
//! Reads go over anonymous HTTP so they work without credentials; writes go
//! through the credentialed [`ObjectStoreClient`] as a whole-object
//! read-modify-write. Two writers racing on the same key lose one update;
//! distinct keys written sequentially both survive.
//!
//! The private index has the same shape, is stored without public access and
//! points at private key prefixes instead of zips.

use hgloc_cache::paths::copy_dir_all;
use hgloc_cache::{metadata_path, zip_dir};
use hgloc_transport::{public_url, ObjectStoreClient, PublicHttp};
use hgloc_types::{
    manifest_entry_key, object_key, prefixed_key, public_zip_key, ArtifactIdentity, ArtifactKind,
    CacheConfig,
};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One public manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub identity: ArtifactIdentity,
    /// Zip key relative to the data prefix.
    pub s3_zip_key: String,
    pub s3_bucket: String,
}

/// One private index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateIndexEntry {
    pub identity: ArtifactIdentity,
    /// Full key prefix of the private copy.
    pub s3_prefix: String,
    pub s3_bucket: String,
}

fn identity_fields(identity: &ArtifactIdentity) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        identity.kind.id_field().to_string(),
        Value::String(identity.namespace.clone()),
    );
    fields.insert(
        "config_name".to_string(),
        identity.variant.clone().map(Value::String).unwrap_or(Value::Null),
    );
    fields.insert(
        "revision".to_string(),
        identity.revision.clone().map(Value::String).unwrap_or(Value::Null),
    );
    fields
}

fn identity_from_fields(kind: ArtifactKind, value: &Value) -> Option<ArtifactIdentity> {
    let namespace = value.get(kind.id_field())?.as_str()?;
    Some(ArtifactIdentity::new(
        kind,
        namespace,
        value.get("config_name").and_then(Value::as_str),
        value.get("revision").and_then(Value::as_str),
    ))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ManifestEntry {
    pub fn to_json(&self) -> Value {
        let mut fields = identity_fields(&self.identity);
        fields.insert("s3_zip_key".to_string(), Value::String(self.s3_zip_key.clone()));
        fields.insert("s3_bucket".to_string(), Value::String(self.s3_bucket.clone()));
        Value::Object(fields)
    }

    /// `None` when the identity field, `s3_zip_key` or `s3_bucket` is missing.
    pub fn from_json(kind: ArtifactKind, value: &Value) -> Option<Self> {
        Some(Self {
            identity: identity_from_fields(kind, value)?,
            s3_zip_key: string_field(value, "s3_zip_key")?,
            s3_bucket: string_field(value, "s3_bucket")?,
        })
    }
}

impl PrivateIndexEntry {
    pub fn to_json(&self) -> Value {
        let mut fields = identity_fields(&self.identity);
        fields.insert("s3_prefix".to_string(), Value::String(self.s3_prefix.clone()));
        fields.insert("s3_bucket".to_string(), Value::String(self.s3_bucket.clone()));
        Value::Object(fields)
    }

    pub fn from_json(kind: ArtifactKind, value: &Value) -> Option<Self> {
        Some(Self {
            identity: identity_from_fields(kind, value)?,
            s3_prefix: string_field(value, "s3_prefix")?,
            s3_bucket: string_field(value, "s3_bucket")?,
        })
    }
}

/// Reads and writes the public manifest and the private index.
pub struct ManifestSync {
    config: Arc<CacheConfig>,
    http: Arc<dyn PublicHttp>,
}

impl ManifestSync {
    pub fn new(config: Arc<CacheConfig>, http: Arc<dyn PublicHttp>) -> Self {
        Self { config, http }
    }

    fn manifest_key(&self, kind: ArtifactKind) -> String {
        prefixed_key(&self.config.layout(kind).manifest_key, self.config.data_prefix())
    }

    fn private_index_key(&self, kind: ArtifactKind) -> String {
        prefixed_key(&self.config.layout(kind).private_index_key, self.config.data_prefix())
    }

    /// Public URL of the manifest, if a bucket is configured.
    pub fn manifest_url(&self, kind: ArtifactKind) -> Option<String> {
        let scope = self.config.bucket_scope()?;
        Some(public_url(
            &scope.bucket_name,
            &self.manifest_key(kind),
            scope.endpoint(),
        ))
    }

    /// GET the manifest anonymously. Any HTTP, transport or parse failure is `None`.
    pub fn fetch_manifest(&self, kind: ArtifactKind) -> Option<Map<String, Value>> {
        let url = self.manifest_url(kind)?;
        let bytes = match self.http.get_bytes(&url, self.config.http_timeout) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(url = %url, error = %e, "public manifest unavailable");
                return None;
            }
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                warn!(url = %url, "public manifest is not a JSON object");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %e, "failed to parse public manifest");
                None
            }
        }
    }

    /// Manifest entry for `identity`, ignoring malformed entries.
    pub fn fetch_entry(&self, identity: &ArtifactIdentity) -> Option<ManifestEntry> {
        let manifest = self.fetch_manifest(identity.kind)?;
        let key = manifest_entry_key(identity, &self.config);
        let value = manifest.get(&key)?;
        let entry = ManifestEntry::from_json(identity.kind, value);
        if entry.is_none() {
            warn!(identity = %identity, key = %key, "ignoring malformed manifest entry");
        }
        entry
    }

    /// All well-formed entries of the manifest for `kind`.
    pub fn list_entries(&self, kind: ArtifactKind) -> Vec<ManifestEntry> {
        let Some(manifest) = self.fetch_manifest(kind) else {
            return Vec::new();
        };
        manifest
            .iter()
            .filter_map(|(key, value)| {
                let entry = ManifestEntry::from_json(kind, value);
                if entry.is_none() {
                    warn!(key = %key, "skipping malformed manifest entry");
                }
                entry
            })
            .collect()
    }

    /// Record `zip_key` (relative to the data prefix) for `identity` in the manifest.
    ///
    /// A missing or corrupt manifest starts empty; any other read failure
    /// aborts so a readable-but-unreachable manifest is never clobbered.
    pub fn publish(&self, client: &ObjectStoreClient, identity: &ArtifactIdentity, zip_key: &str) -> bool {
        let key = self.manifest_key(identity.kind);
        let Some(mut manifest) = read_object_map(client, &key) else {
            return false;
        };
        let entry = ManifestEntry {
            identity: identity.clone(),
            s3_zip_key: zip_key.to_string(),
            s3_bucket: client.bucket().to_string(),
        };
        manifest.insert(manifest_entry_key(identity, &self.config), entry.to_json());

        match client.put_json(&key, &Value::Object(manifest), true) {
            Ok(()) => {
                info!(identity = %identity, bucket = %client.bucket(), key = %key, "public manifest updated");
                true
            }
            Err(e) => {
                warn!(identity = %identity, key = %key, error = %e, "failed to write public manifest");
                false
            }
        }
    }

    /// Whether the manifest stored in the bucket already lists `identity` at `zip_key`.
    pub fn is_published(&self, client: &ObjectStoreClient, identity: &ArtifactIdentity, zip_key: &str) -> bool {
        let key = self.manifest_key(identity.kind);
        let Some(manifest) = read_object_map(client, &key) else {
            return false;
        };
        manifest
            .get(&manifest_entry_key(identity, &self.config))
            .and_then(|value| ManifestEntry::from_json(identity.kind, value))
            .map(|entry| entry.s3_zip_key == zip_key && entry.s3_bucket == client.bucket())
            .unwrap_or(false)
    }

    /// Zip `bundle_dir`, upload it public-read, then record it in the manifest.
    ///
    /// The manifest is only touched after the zip upload succeeds.
    pub fn package_and_publish(
        &self,
        bundle_dir: &Path,
        identity: &ArtifactIdentity,
        client: &ObjectStoreClient,
    ) -> bool {
        let scratch = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(identity = %identity, error = %e, "failed to create scratch dir");
                return false;
            }
        };
        let content = scratch.path().join("bundle");
        if let Err(e) = copy_dir_all(bundle_dir, &content) {
            warn!(identity = %identity, path = %bundle_dir.display(), error = %e, "failed to stage bundle");
            return false;
        }
        let _ = std::fs::remove_file(metadata_path(&content));

        let zip_path = scratch.path().join("bundle.zip");
        if !zip_dir(&content, &zip_path) {
            return false;
        }

        let zip_key = public_zip_key(identity, &self.config);
        let full_key = prefixed_key(&zip_key, client.data_prefix());
        if let Err(e) = client.put_file(&full_key, &zip_path, true) {
            warn!(identity = %identity, key = %full_key, error = %e, "failed to upload public zip");
            return false;
        }
        info!(identity = %identity, bucket = %client.bucket(), key = %full_key, "uploaded public zip");
        self.publish(client, identity, &zip_key)
    }

    /// Download the public zip for `identity` and extract it into `dest`.
    ///
    /// Leaves whatever was extracted on failure; callers own cleanup of `dest`.
    pub fn download_public_zip(&self, identity: &ArtifactIdentity, dest: &Path) -> bool {
        let Some(entry) = self.fetch_entry(identity) else {
            debug!(identity = %identity, "not listed in public manifest");
            return false;
        };
        let endpoint = self.config.bucket_scope().and_then(|s| s.endpoint());
        let full_key = prefixed_key(&entry.s3_zip_key, self.config.data_prefix());
        let url = public_url(&entry.s3_bucket, &full_key, endpoint);

        let scratch = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(identity = %identity, error = %e, "failed to create scratch dir");
                return false;
            }
        };
        let zip_path = scratch.path().join("bundle.zip");
        if let Err(e) = self
            .http
            .get_to_file(&url, &zip_path, self.config.download_timeout)
        {
            warn!(identity = %identity, url = %url, error = %e, "failed to download public zip");
            return false;
        }
        hgloc_cache::unzip(&zip_path, dest)
    }

    /// Record the private copy of `identity` in the private index.
    pub fn update_private_index(&self, client: &ObjectStoreClient, identity: &ArtifactIdentity) -> bool {
        let key = self.private_index_key(identity.kind);
        let Some(mut index) = read_object_map(client, &key) else {
            return false;
        };
        let entry = PrivateIndexEntry {
            identity: identity.clone(),
            s3_prefix: object_key(identity, client.data_prefix(), &self.config),
            s3_bucket: client.bucket().to_string(),
        };
        index.insert(manifest_entry_key(identity, &self.config), entry.to_json());

        match client.put_json(&key, &Value::Object(index), false) {
            Ok(()) => {
                debug!(identity = %identity, key = %key, "private index updated");
                true
            }
            Err(e) => {
                warn!(identity = %identity, key = %key, error = %e, "failed to write private index");
                false
            }
        }
    }

    /// Private index entries, or `None` when the index is absent or unreadable.
    pub fn fetch_private_index(&self, client: &ObjectStoreClient, kind: ArtifactKind) -> Option<Vec<PrivateIndexEntry>> {
        let key = self.private_index_key(kind);
        let index = match client.get_json::<Value>(&key) {
            Ok(Some(Value::Object(map))) => map,
            Ok(_) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read private index");
                return None;
            }
        };
        Some(
            index
                .values()
                .filter_map(|value| PrivateIndexEntry::from_json(kind, value))
                .collect(),
        )
    }
}

/// Read a JSON object for read-modify-write. Missing or corrupt objects start
/// empty; other read failures yield `None`.
fn read_object_map(client: &ObjectStoreClient, key: &str) -> Option<Map<String, Value>> {
    match client.get_json::<Value>(key) {
        Ok(Some(Value::Object(map))) => Some(map),
        Ok(Some(_)) => {
            warn!(key, "JSON index is not an object, starting empty");
            Some(Map::new())
        }
        Ok(None) => Some(Map::new()),
        Err(e) => {
            warn!(bucket = %client.bucket(), key, error = %e, "failed to read JSON index, not updating");
            None
        }
    }
}
