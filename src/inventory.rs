//! Inventory Scanner.
//!
//! Display-only listings of what is cached locally and what the remote holds.
//! Nothing on the resolve or publish path depends on these results.

use hgloc_cache::BundleStore;
use hgloc_transport::{join_key, ObjectStoreClient};
use hgloc_types::naming::scan_base_prefix;
use hgloc_types::{
    restore_display_name, ArtifactIdentity, ArtifactKind, CacheConfig, Visibility, BY_BUCKET_DIR,
    PUBLIC_DIR,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::manifest::ManifestSync;
use crate::resolver::AccessMode;

/// One complete bundle found on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub identity: ArtifactIdentity,
    pub visibility: Visibility,
    pub path: PathBuf,
    /// Bucket directory name for bucket-scoped entries, `None` for the legacy layout.
    pub bucket: Option<String>,
}

/// Where a remote listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSource {
    PrivateIndex,
    PrefixWalk,
    PublicManifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub identity: ArtifactIdentity,
    pub source: RemoteSource,
    /// Presigned URL of the bundle's card, when one exists remotely.
    pub card_url: Option<String>,
}

/// Identity for a sanitized `[namespace, variant, revision]` triple.
///
/// Defaulted variant and revision come back as `None`.
pub fn identity_from_segments(
    kind: ArtifactKind,
    segments: [&str; 3],
    config: &CacheConfig,
) -> ArtifactIdentity {
    let [ns, variant, revision] = segments;
    ArtifactIdentity::new(
        kind,
        restore_display_name(ns),
        (variant != config.default_variant_name).then_some(variant),
        (revision != config.default_revision_name).then_some(revision),
    )
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.depth() == 1 && (name == PUBLIC_DIR || name == BY_BUCKET_DIR))
}

/// `<root>/<ns>/<variant>/<revision>` directories, excluding reserved top-level dirs.
fn leaf_dirs(root: &Path) -> Vec<(PathBuf, [String; 3])> {
    WalkDir::new(root)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e))
        .filter_map(Result::ok)
        .filter(|e| e.depth() == 3 && e.file_type().is_dir())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let [ns, variant, revision]: [String; 3] = parts.try_into().ok()?;
            Some((e.path().to_path_buf(), [ns, variant, revision]))
        })
        .collect()
}

/// Immediate subdirectory names of `dir`, sorted.
fn child_dirs(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// List complete local bundles of `kind`.
///
/// Walks the legacy flat layout and every `by_bucket/<id>` tree under the
/// private root (unless `PublicOnly`) and the public root. With
/// `bucket_filter`, only bundles whose metadata matches the configured scope
/// are kept. A public copy replaces a private one with the same identity.
pub fn scan_local(
    config: &CacheConfig,
    store: &dyn BundleStore,
    kind: ArtifactKind,
    access: AccessMode,
    bucket_filter: bool,
) -> Vec<InventoryEntry> {
    let mut visibilities = Vec::new();
    if access == AccessMode::Any {
        visibilities.push(Visibility::Private);
    }
    visibilities.push(Visibility::Public);

    let scope = config.bucket_scope();
    let mut found: BTreeMap<[String; 3], InventoryEntry> = BTreeMap::new();
    for visibility in visibilities {
        let root = config.store_root(kind, visibility);
        let mut trees: Vec<(PathBuf, Option<String>)> = vec![(root.clone(), None)];
        let by_bucket = root.join(BY_BUCKET_DIR);
        for bucket in child_dirs(&by_bucket) {
            trees.push((by_bucket.join(&bucket), Some(bucket)));
        }

        for (tree, bucket) in trees {
            for (path, segments) in leaf_dirs(&tree) {
                if !store.exists(kind, &path) {
                    continue;
                }
                if bucket_filter && !store.matches_current_scope(&path, scope) {
                    debug!(path = %path.display(), "skipping bundle cached from another bucket");
                    continue;
                }
                let identity = identity_from_segments(
                    kind,
                    [&segments[0], &segments[1], &segments[2]],
                    config,
                );
                found.insert(
                    segments,
                    InventoryEntry {
                        identity,
                        visibility,
                        path,
                        bucket: bucket.clone(),
                    },
                );
            }
        }
    }
    found.into_values().collect()
}

/// List artifacts of `kind` available remotely.
///
/// Tries the private index first, then a three-level prefix walk validated by
/// marker files, then the public manifest. The first source that yields
/// anything wins.
pub fn scan_remote(
    config: &CacheConfig,
    client: Option<&ObjectStoreClient>,
    manifest: &ManifestSync,
    kind: ArtifactKind,
) -> Vec<RemoteEntry> {
    if let Some(client) = client {
        let card_file = &config.layout(kind).card_file;
        if let Some(entries) = manifest.fetch_private_index(client, kind) {
            if !entries.is_empty() {
                debug!(kind = %kind, count = entries.len(), "listed remote from private index");
                return entries
                    .into_iter()
                    .map(|entry| RemoteEntry {
                        card_url: client
                            .presigned_url(&join_key(&entry.s3_prefix, card_file), config.presign_ttl),
                        identity: entry.identity,
                        source: RemoteSource::PrivateIndex,
                    })
                    .collect();
            }
        }

        match walk_prefixes(config, client, kind) {
            Ok(entries) if !entries.is_empty() => return entries,
            Ok(_) => debug!(kind = %kind, "prefix walk found nothing"),
            Err(e) => warn!(bucket = %client.bucket(), error = %e, "prefix walk failed"),
        }
    }

    manifest
        .list_entries(kind)
        .into_iter()
        .map(|entry| RemoteEntry {
            identity: entry.identity,
            source: RemoteSource::PublicManifest,
            card_url: None,
        })
        .collect()
}

fn last_segment(prefix: &str) -> &str {
    prefix
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

fn walk_prefixes(
    config: &CacheConfig,
    client: &ObjectStoreClient,
    kind: ArtifactKind,
) -> Result<Vec<RemoteEntry>, hgloc_transport::StoreError> {
    let layout = config.layout(kind);
    let reserved = [
        "models",
        config.datasets.public_zip_dir.trim_matches('/'),
        config.models.public_zip_dir.trim_matches('/'),
    ];
    let base = scan_base_prefix(kind, client.data_prefix());

    let mut entries = Vec::new();
    for ns_prefix in client.list_common_prefixes(&base)? {
        let ns = last_segment(&ns_prefix);
        if reserved.contains(&ns) {
            continue;
        }
        for variant_prefix in client.list_common_prefixes(&ns_prefix)? {
            let variant = last_segment(&variant_prefix);
            for revision_prefix in client.list_common_prefixes(&variant_prefix)? {
                let revision = last_segment(&revision_prefix);
                let key_prefix = revision_prefix.trim_end_matches('/');
                if !client.markers_exist(key_prefix, &layout.marker_files) {
                    continue;
                }
                entries.push(RemoteEntry {
                    identity: identity_from_segments(kind, [ns, variant, revision], config),
                    source: RemoteSource::PrefixWalk,
                    card_url: client
                        .presigned_url(&join_key(key_prefix, &layout.card_file), config.presign_ttl),
                });
            }
        }
    }
    Ok(entries)
}
