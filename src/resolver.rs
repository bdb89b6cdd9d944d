//! Resolution Orchestrator.
//!
//! [`ArtifactCache`] walks the tiers in order:
//!
//! ```text
//! local-public -> local-private -> remote-private -> public manifest -> (origin)
//! ```
//!
//! Local hits make no remote calls at all; the object store client is built
//! lazily on the first call that needs it and reused afterwards. Remote failures
//! never escape: they are logged and the walk falls through to the next tier.
//!
//! Calls for the same identity on one `ArtifactCache` are serialized through an
//! in-process lock table. Separate processes sharing the cache directories
//! still race.

use anyhow::{anyhow, Result};
use hgloc_cache::paths::atomic_write;
use hgloc_cache::{ArtifactBundle, BundleStore, FsBundleStore};
use hgloc_transport::{join_key, ObjectStore, ObjectStoreClient, PublicHttp, UreqPublicHttp};
use hgloc_types::naming::identity_segments;
use hgloc_types::{
    local_path, object_key, prefixed_key, public_zip_key, ArtifactIdentity, ArtifactKind,
    CacheConfig, Visibility,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::inventory::{self, InventoryEntry, RemoteEntry};
use crate::locks::KeyedLocks;
use crate::manifest::ManifestSync;
use crate::metrics::ResolveMetrics;
use crate::origin::OriginFetcher;

/// Which local copies a caller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Only the public copy (local public store, public manifest).
    PublicOnly,
    /// Public preferred, private accepted.
    Any,
}

/// The tier that satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    LocalPublic,
    LocalPrivate,
    RemotePrivate,
    PublicManifest,
    Origin,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::LocalPublic => "local-public",
            Tier::LocalPrivate => "local-private",
            Tier::RemotePrivate => "remote-private",
            Tier::PublicManifest => "public-manifest",
            Tier::Origin => "origin",
        };
        f.write_str(name)
    }
}

/// A bundle available on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub identity: ArtifactIdentity,
    pub path: PathBuf,
    pub visibility: Visibility,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(LocalArtifact),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn artifact(&self) -> Option<&LocalArtifact> {
        match self {
            Resolution::Found(artifact) => Some(artifact),
            Resolution::NotFound => None,
        }
    }

    pub fn into_artifact(self) -> Option<LocalArtifact> {
        match self {
            Resolution::Found(artifact) => Some(artifact),
            Resolution::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Save to the public store and publish a zip plus manifest entry.
    pub force_public: bool,
    /// Keep the bundle local only.
    pub skip_remote_upload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub success: bool,
    pub message: String,
    /// Local bundle path, when the local save succeeded.
    pub path: Option<PathBuf>,
}

impl PublishOutcome {
    fn failed(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Cache (and publish) the fetched bundle as public.
    pub make_public: bool,
    pub skip_remote_upload: bool,
    /// Passed through to the origin fetcher.
    pub trust_remote_code: bool,
}

/// Counts from [`ArtifactCache::sync_all_to_remote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Builder for [`ArtifactCache`].
pub struct ArtifactCacheBuilder {
    config: CacheConfig,
    object_store: Option<Arc<dyn ObjectStore>>,
    public_http: Option<Arc<dyn PublicHttp>>,
}

impl ArtifactCacheBuilder {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            object_store: None,
            public_http: None,
        }
    }

    /// Use this backend instead of S3 for credentialed access.
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Use this client for anonymous manifest and zip downloads.
    pub fn public_http(mut self, http: Arc<dyn PublicHttp>) -> Self {
        self.public_http = Some(http);
        self
    }

    pub fn build(self) -> ArtifactCache {
        let config = Arc::new(self.config);
        let http = self
            .public_http
            .unwrap_or_else(|| Arc::new(UreqPublicHttp::new()));
        ArtifactCache {
            store: Arc::new(FsBundleStore::new(config.clone())),
            manifest: ManifestSync::new(config.clone(), http),
            object_store: self.object_store,
            remote: OnceLock::new(),
            locks: KeyedLocks::new(),
            metrics: ResolveMetrics::default(),
            config,
        }
    }
}

/// Multi-tier cache of dataset and model bundles.
pub struct ArtifactCache {
    config: Arc<CacheConfig>,
    store: Arc<dyn BundleStore>,
    manifest: ManifestSync,
    object_store: Option<Arc<dyn ObjectStore>>,
    remote: OnceLock<Option<ObjectStoreClient>>,
    locks: KeyedLocks,
    metrics: ResolveMetrics,
}

impl ArtifactCache {
    /// Cache using S3 and `ureq` for its remote tiers.
    pub fn new(config: CacheConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> ArtifactCacheBuilder {
        ArtifactCacheBuilder::new(config)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ResolveMetrics {
        &self.metrics
    }

    pub fn manifest(&self) -> &ManifestSync {
        &self.manifest
    }

    /// The shared client, or `None` in anonymous mode or when the remote is unreachable.
    ///
    /// The outcome of the first construction is kept for the life of the cache.
    pub fn client(&self) -> Option<&ObjectStoreClient> {
        if !self.config.has_credentials() {
            return None;
        }
        self.remote
            .get_or_init(|| match (&self.object_store, self.config.bucket_scope()) {
                (Some(store), Some(scope)) => {
                    ObjectStoreClient::from_store(store.clone(), scope.clone())
                }
                _ => ObjectStoreClient::construct(&self.config),
            })
            .as_ref()
    }

    fn path_for(&self, identity: &ArtifactIdentity, visibility: Visibility) -> PathBuf {
        local_path(identity, self.config.bucket_scope(), visibility, &self.config)
    }

    fn lock_key(&self, identity: &ArtifactIdentity) -> String {
        format!(
            "{}:{}",
            identity.kind,
            identity_segments(identity, &self.config).join("/")
        )
    }

    fn found(&self, identity: &ArtifactIdentity, path: PathBuf, visibility: Visibility, tier: Tier) -> Resolution {
        info!(identity = %identity, tier = %tier, path = %path.display(), "resolved");
        Resolution::Found(LocalArtifact {
            identity: identity.clone(),
            path,
            visibility,
            tier,
        })
    }

    /// Find `identity` in the cheapest tier that has it, materializing remote
    /// copies locally.
    pub fn resolve(&self, identity: &ArtifactIdentity, access: AccessMode) -> Resolution {
        let lock = self.locks.get(&self.lock_key(identity));
        let _guard = lock.lock();
        self.resolve_unlocked(identity, access)
    }

    fn resolve_unlocked(&self, identity: &ArtifactIdentity, access: AccessMode) -> Resolution {
        let kind = identity.kind;

        let public_path = self.path_for(identity, Visibility::Public);
        if self.store.exists(kind, &public_path) {
            self.metrics.record_local_public_hit();
            return self.found(identity, public_path, Visibility::Public, Tier::LocalPublic);
        }

        if access == AccessMode::Any {
            let private_path = self.path_for(identity, Visibility::Private);
            if self.store.exists(kind, &private_path) {
                self.metrics.record_local_private_hit();
                return self.found(identity, private_path, Visibility::Private, Tier::LocalPrivate);
            }

            if let Some(path) = self.fetch_remote(identity, Visibility::Private) {
                self.metrics.record_remote_private_hit();
                return self.found(identity, path, Visibility::Private, Tier::RemotePrivate);
            }
        }

        if let Some(path) = self.fetch_public_zip(identity) {
            self.metrics.record_manifest_hit();
            return self.found(identity, path, Visibility::Public, Tier::PublicManifest);
        }

        debug!(identity = %identity, access = ?access, "not found in any tier");
        self.metrics.record_miss();
        Resolution::NotFound
    }

    /// Download the remote private copy into the local store for `visibility`.
    fn fetch_remote(&self, identity: &ArtifactIdentity, visibility: Visibility) -> Option<PathBuf> {
        let client = self.client()?;
        let kind = identity.kind;
        let key = object_key(identity, client.data_prefix(), &self.config);
        if !client.markers_exist(&key, &self.config.layout(kind).marker_files) {
            debug!(identity = %identity, bucket = %client.bucket(), key = %key, "no remote private copy");
            return None;
        }

        let dest = self.path_for(identity, visibility);
        if !client.download_tree(&key, &dest) || !self.store.exists(kind, &dest) {
            warn!(identity = %identity, bucket = %client.bucket(), key = %key, "remote private copy unusable, falling through");
            self.discard(&dest);
            return None;
        }
        self.store
            .write_metadata(&dest, kind, self.config.bucket_scope(), visibility);
        Some(dest)
    }

    fn fetch_public_zip(&self, identity: &ArtifactIdentity) -> Option<PathBuf> {
        self.config.bucket_scope()?;
        let kind = identity.kind;
        let dest = self.path_for(identity, Visibility::Public);
        if !self.manifest.download_public_zip(identity, &dest) || !self.store.exists(kind, &dest) {
            self.discard(&dest);
            return None;
        }
        self.store
            .write_metadata(&dest, kind, self.config.bucket_scope(), Visibility::Public);
        Some(dest)
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = self.store.delete(path) {
            warn!(path = %path.display(), error = %e, "failed to clean up partial bundle");
        }
    }

    /// Save `bundle` locally, then push it to the remote tiers.
    ///
    /// A failed private upload fails the call; a failed public zip or manifest
    /// update is only reported in the message. The local copy is kept either way.
    pub fn publish(
        &self,
        bundle: &dyn ArtifactBundle,
        identity: &ArtifactIdentity,
        options: PublishOptions,
    ) -> PublishOutcome {
        let lock = self.locks.get(&self.lock_key(identity));
        let _guard = lock.lock();

        let visibility = Visibility::from_public_flag(options.force_public);
        let outcome = match self.save_local(bundle, identity, visibility) {
            Ok(path) => self.push_remote(&path, identity, options),
            Err(e) => {
                warn!(identity = %identity, error = %e, "failed to save bundle locally");
                PublishOutcome::failed(format!("Failed to save {} locally: {}", identity, e), None)
            }
        };
        self.metrics.record_publish(outcome.success);
        outcome
    }

    /// Write `bundle` at its local path unless a complete copy is already there.
    ///
    /// A failed write removes whatever was written.
    fn save_local(
        &self,
        bundle: &dyn ArtifactBundle,
        identity: &ArtifactIdentity,
        visibility: Visibility,
    ) -> Result<PathBuf> {
        let kind = identity.kind;
        let path = self.path_for(identity, visibility);
        if self.store.exists(kind, &path) {
            debug!(identity = %identity, path = %path.display(), "already cached locally");
        } else {
            let written = self.store.write_bundle(&path, bundle).and_then(|()| {
                if self.store.exists(kind, &path) {
                    Ok(())
                } else {
                    Err(anyhow!("bundle at {} has no marker file", path.display()))
                }
            });
            if let Err(e) = written {
                self.discard(&path);
                return Err(e);
            }
            info!(identity = %identity, path = %path.display(), visibility = ?visibility, "saved bundle locally");
        }
        self.store
            .write_metadata(&path, kind, self.config.bucket_scope(), visibility);
        Ok(path)
    }

    fn push_remote(&self, path: &Path, identity: &ArtifactIdentity, options: PublishOptions) -> PublishOutcome {
        let saved = Some(path.to_path_buf());
        if options.skip_remote_upload {
            return PublishOutcome {
                success: true,
                message: format!("Saved {} locally at {} (remote upload skipped)", identity, path.display()),
                path: saved,
            };
        }
        let Some(client) = self.client() else {
            return PublishOutcome {
                success: true,
                message: format!("Saved {} locally at {} (no remote configured)", identity, path.display()),
                path: saved,
            };
        };

        let key = object_key(identity, client.data_prefix(), &self.config);
        let markers = &self.config.layout(identity.kind).marker_files;
        let mut message = if client.markers_exist(&key, markers) {
            debug!(identity = %identity, bucket = %client.bucket(), key = %key, "remote private copy already present");
            format!("{} already present at s3://{}/{}", identity, client.bucket(), key)
        } else {
            match client.upload_tree(path, &key) {
                Ok(report) if report.is_complete() => {
                    self.manifest.update_private_index(client, identity);
                    format!("Uploaded {} to s3://{}/{}", identity, client.bucket(), key)
                }
                Ok(report) => {
                    return PublishOutcome::failed(
                        format!(
                            "Upload of {} to s3://{}/{} incomplete: {} uploaded, {} failed",
                            identity,
                            client.bucket(),
                            key,
                            report.uploaded,
                            report.failed.len()
                        ),
                        saved,
                    );
                }
                Err(e) => {
                    warn!(identity = %identity, key = %key, error = %e, "upload failed");
                    return PublishOutcome::failed(format!("Upload of {} failed: {}", identity, e), saved);
                }
            }
        };

        if options.force_public {
            if self.ensure_public(path, identity, client) {
                message.push_str("; published to the public manifest");
            } else {
                warn!(identity = %identity, "public zip or manifest update failed");
                message.push_str("; public zip or manifest update failed");
            }
        }

        PublishOutcome {
            success: true,
            message,
            path: saved,
        }
    }

    /// Make `identity` downloadable through the public manifest.
    ///
    /// An already uploaded zip is reused; only a missing manifest entry is written.
    fn ensure_public(&self, path: &Path, identity: &ArtifactIdentity, client: &ObjectStoreClient) -> bool {
        let zip_key = public_zip_key(identity, &self.config);
        let full_key = prefixed_key(&zip_key, client.data_prefix());
        if !client.object_exists(&full_key) {
            return self.manifest.package_and_publish(path, identity, client);
        }
        if self.manifest.is_published(client, identity, &zip_key) {
            debug!(identity = %identity, key = %full_key, "already published");
            return true;
        }
        self.manifest.publish(client, identity, &zip_key)
    }

    /// Resolve `identity`, falling back to `origin` on a miss.
    ///
    /// With `make_public`, a remote private copy missing from the public tiers
    /// is downloaded into the public store and published instead of being
    /// fetched again. A fetched bundle is saved (plus its card) and pushed to the remote tiers
    /// like [`ArtifactCache::publish`]. If fetching or saving fails, nothing is
    /// left on disk. Remote failures after a successful save are logged only.
    pub fn acquire(
        &self,
        identity: &ArtifactIdentity,
        origin: &dyn OriginFetcher,
        options: AcquireOptions,
    ) -> Result<Resolution> {
        let lock = self.locks.get(&self.lock_key(identity));
        let _guard = lock.lock();

        let access = if options.make_public {
            AccessMode::PublicOnly
        } else {
            AccessMode::Any
        };
        let resolution = self.resolve_unlocked(identity, access);
        if resolution.is_found() {
            return Ok(resolution);
        }

        if options.make_public {
            if let Some(path) = self.fetch_remote(identity, Visibility::Public) {
                self.metrics.record_remote_private_hit();
                self.finish_acquire(&path, identity, options);
                return Ok(self.found(identity, path, Visibility::Public, Tier::RemotePrivate));
            }
        }

        info!(identity = %identity, "fetching from origin");
        let Some(bundle) = origin.fetch(identity, options.trust_remote_code)? else {
            info!(identity = %identity, "origin does not have artifact");
            return Ok(Resolution::NotFound);
        };
        self.metrics.record_origin_fetch();

        let visibility = Visibility::from_public_flag(options.make_public);
        let path = self
            .save_local(bundle.as_ref(), identity, visibility)
            .map_err(|e| anyhow!("Failed to save {} from origin: {}", identity, e))?;

        if let Some(card) = origin.fetch_card(identity) {
            let card_path = path.join(&self.config.layout(identity.kind).card_file);
            if let Err(e) = atomic_write(&card_path, card.as_bytes()) {
                warn!(identity = %identity, path = %card_path.display(), error = %e, "failed to save card");
            }
        }

        self.finish_acquire(&path, identity, options);
        Ok(self.found(identity, path, visibility, Tier::Origin))
    }

    fn finish_acquire(&self, path: &Path, identity: &ArtifactIdentity, options: AcquireOptions) {
        let outcome = self.push_remote(
            path,
            identity,
            PublishOptions {
                force_public: options.make_public,
                skip_remote_upload: options.skip_remote_upload,
            },
        );
        self.metrics.record_publish(outcome.success);
        if !outcome.success {
            warn!(identity = %identity, message = %outcome.message, "cached locally but remote publish failed");
        }
    }

    /// Push an already cached bundle to the remote, preferring its public copy.
    pub fn sync_to_remote(&self, identity: &ArtifactIdentity, make_public: bool) -> PublishOutcome {
        let lock = self.locks.get(&self.lock_key(identity));
        let _guard = lock.lock();

        if self.client().is_none() {
            return PublishOutcome::failed(
                format!("Cannot sync {}: remote not configured or unavailable", identity),
                None,
            );
        }

        let kind = identity.kind;
        let public_path = self.path_for(identity, Visibility::Public);
        let private_path = self.path_for(identity, Visibility::Private);
        let path = if self.store.exists(kind, &public_path) {
            public_path
        } else if self.store.exists(kind, &private_path) {
            private_path
        } else {
            return PublishOutcome::failed(format!("{} is not cached locally", identity), None);
        };

        self.push_remote(
            &path,
            identity,
            PublishOptions {
                force_public: make_public,
                skip_remote_upload: false,
            },
        )
    }

    /// Sync every locally cached bundle from the configured bucket.
    pub fn sync_all_to_remote(&self, make_public: bool) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for kind in [ArtifactKind::Dataset, ArtifactKind::Model] {
            for entry in self.scan_local(kind, AccessMode::Any, true) {
                let outcome = self.sync_to_remote(&entry.identity, make_public);
                if outcome.success {
                    summary.succeeded += 1;
                } else {
                    warn!(identity = %entry.identity, message = %outcome.message, "sync failed");
                    summary.failed += 1;
                }
            }
        }
        info!(succeeded = summary.succeeded, failed = summary.failed, "sync finished");
        summary
    }

    /// Text of a card file, defaulting to the kind's card name.
    ///
    /// Looks in the local public and private copies, then downloads the single
    /// file from the remote private copy into the local private store.
    pub fn card_content(&self, identity: &ArtifactIdentity, file: Option<&str>) -> Option<String> {
        let file = file.unwrap_or(&self.config.layout(identity.kind).card_file);
        for visibility in [Visibility::Public, Visibility::Private] {
            if let Some(text) = self.store.read_text(&self.path_for(identity, visibility), file) {
                return Some(text);
            }
        }

        let client = self.client()?;
        let key = join_key(&object_key(identity, client.data_prefix(), &self.config), file);
        let private_path = self.path_for(identity, Visibility::Private);
        match client.download_object(&key, &private_path.join(file)) {
            Ok(_) => self.store.read_text(&private_path, file),
            Err(e) => {
                debug!(identity = %identity, key = %key, error = %e, "no remote card");
                None
            }
        }
    }

    /// Presigned URL for a card in the remote private copy.
    pub fn card_presigned_url(
        &self,
        identity: &ArtifactIdentity,
        file: Option<&str>,
        ttl: Option<Duration>,
    ) -> Option<String> {
        let client = self.client()?;
        let file = file.unwrap_or(&self.config.layout(identity.kind).card_file);
        let key = join_key(&object_key(identity, client.data_prefix(), &self.config), file);
        client.presigned_url(&key, ttl.unwrap_or(self.config.presign_ttl))
    }

    pub fn scan_local(&self, kind: ArtifactKind, access: AccessMode, bucket_filter: bool) -> Vec<InventoryEntry> {
        inventory::scan_local(&self.config, self.store.as_ref(), kind, access, bucket_filter)
    }

    pub fn scan_remote(&self, kind: ArtifactKind) -> Vec<RemoteEntry> {
        inventory::scan_remote(&self.config, self.client(), &self.manifest, kind)
    }
}
