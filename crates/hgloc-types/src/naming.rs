//! Identity & Path Resolver.
//!
//! Pure naming logic mapping an [`ArtifactIdentity`] to its local directory and
//! remote object keys. Every function here is deterministic and performs no I/O.
//!
//! Local layout:
//!
//! ```text
//! <root>/[public/][by_bucket/<bucket_id>/]<ns>/<variant>/<revision>/
//! ```
//!
//! Remote layout:
//!
//! ```text
//! [<data_prefix>/][models/]<ns>/<variant>/<revision>/...
//! ```
//!
//! Two identities whose components sanitize to the same strings share a path.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};

use crate::config::CacheConfig;
use crate::identity::{ArtifactIdentity, ArtifactKind, BucketScope, Visibility};

/// Directory separating bucket-scoped entries from the legacy flat layout.
pub const BY_BUCKET_DIR: &str = "by_bucket";
/// Directory holding public copies inside a store root.
pub const PUBLIC_DIR: &str = "public";

const MODELS_KEY_SEGMENT: &str = "models";
const UNSAFE_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Replace characters unsafe for file and key names with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Best-effort reverse of [`sanitize`] for namespaces: the last `_` becomes `/`.
///
/// Lossy. `my_org_data` restores to `my_org/data` whatever the original was;
/// already-cached data depends on this exact heuristic.
pub fn restore_display_name(sanitized: &str) -> String {
    match sanitized.rfind('_') {
        Some(idx) => format!("{}/{}", &sanitized[..idx], &sanitized[idx + 1..]),
        None => sanitized.to_string(),
    }
}

/// Directory name isolating artifacts cached from one remote target.
///
/// The sanitized bucket name, suffixed with the first 8 hex digits of the
/// endpoint's MD5 when a custom endpoint is set.
pub fn bucket_identifier(scope: &BucketScope) -> String {
    let safe_bucket = sanitize(&scope.bucket_name);
    match scope.endpoint() {
        Some(endpoint) => {
            let digest = hex::encode(Md5::digest(endpoint.as_bytes()));
            format!("{}_{}", safe_bucket, &digest[..8])
        }
        None => safe_bucket,
    }
}

/// The three sanitized path components of an identity, defaults applied.
pub fn identity_segments(identity: &ArtifactIdentity, config: &CacheConfig) -> [String; 3] {
    [
        sanitize(&identity.namespace),
        sanitize(identity.variant_or(&config.default_variant_name)),
        sanitize(identity.revision_or(&config.default_revision_name)),
    ]
}

/// Local directory for an identity at the given visibility.
///
/// The `by_bucket/<bucket_id>` segment is present only when `scope` is given.
pub fn local_path(
    identity: &ArtifactIdentity,
    scope: Option<&BucketScope>,
    visibility: Visibility,
    config: &CacheConfig,
) -> PathBuf {
    let mut path = config.store_root(identity.kind, visibility);
    if let Some(scope) = scope {
        path = path.join(BY_BUCKET_DIR).join(bucket_identifier(scope));
    }
    for segment in identity_segments(identity, config) {
        path = path.join(segment);
    }
    path
}

/// Join `base` under the data prefix, trimming stray slashes on both sides.
pub fn prefixed_key(base: &str, data_prefix: Option<&str>) -> String {
    let base = base.trim_start_matches('/');
    match data_prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, base),
        None => base.to_string(),
    }
}

/// Remote key prefix of an identity's private copy (no trailing slash).
pub fn object_key(
    identity: &ArtifactIdentity,
    data_prefix: Option<&str>,
    config: &CacheConfig,
) -> String {
    let [ns, variant, revision] = identity_segments(identity, config);
    let base = match identity.kind {
        ArtifactKind::Dataset => format!("{}/{}/{}", ns, variant, revision),
        ArtifactKind::Model => format!("{}/{}/{}/{}", MODELS_KEY_SEGMENT, ns, variant, revision),
    };
    prefixed_key(&base, data_prefix)
}

/// Prefix under which the inventory walk finds namespaces of `kind`.
pub fn scan_base_prefix(kind: ArtifactKind, data_prefix: Option<&str>) -> String {
    let base = match kind {
        ArtifactKind::Dataset => String::new(),
        ArtifactKind::Model => format!("{}/", MODELS_KEY_SEGMENT),
    };
    match data_prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, base),
        None => base,
    }
}

/// Composite manifest key: raw namespace plus defaulted variant and revision.
pub fn manifest_entry_key(identity: &ArtifactIdentity, config: &CacheConfig) -> String {
    format!(
        "{}---{}---{}",
        identity.namespace,
        identity.variant_or(&config.default_variant_name),
        identity.revision_or(&config.default_revision_name)
    )
}

/// Key of the public zip, relative to the data prefix.
pub fn public_zip_key(identity: &ArtifactIdentity, config: &CacheConfig) -> String {
    let [ns, variant, revision] = identity_segments(identity, config);
    format!(
        "{}/{}---{}---{}.zip",
        config.layout(identity.kind).public_zip_dir.trim_matches('/'),
        ns,
        variant,
        revision
    )
}

/// Forward-slash relative name of `path` under `root`, as used in zip entries and object keys.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config() -> CacheConfig {
        CacheConfig::new("/cache")
    }

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize("acme/widgets"), "acme_widgets");
        assert_eq!(sanitize(r#"a\b:c*d?e"f<g>h|i j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize("it's-fine.v2"), "it's-fine.v2");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_restore_display_name() {
        assert_eq!(restore_display_name(&sanitize("org/name")), "org/name");
        assert_eq!(restore_display_name("dreamerdeo_finqa"), "dreamerdeo/finqa");
        assert_eq!(restore_display_name("microsoft_DialoGPT_medium"), "microsoft_DialoGPT/medium");
        assert_eq!(restore_display_name("squad"), "squad");
    }

    #[test]
    fn test_restore_is_lossy_for_underscored_namespaces() {
        // "my_org/data" and "my/org_data" both sanitize to "my_org_data".
        assert_eq!(sanitize("my/org_data"), sanitize("my_org/data"));
        assert_eq!(restore_display_name("my_org_data"), "my_org/data");
    }

    #[test]
    fn test_bucket_identifier() {
        assert_eq!(bucket_identifier(&BucketScope::bucket("b1")), "b1");

        let scoped = BucketScope::new("b1", Some("https://minio.local:9000"), None);
        let id = bucket_identifier(&scoped);
        assert!(id.starts_with("b1_"));
        assert_eq!(id.len(), "b1_".len() + 8);
        assert!(id["b1_".len()..].chars().all(|c| c.is_ascii_hexdigit()));

        let other = BucketScope::new("b1", Some("https://other.local"), None);
        assert_ne!(id, bucket_identifier(&other));
    }

    #[test]
    fn test_local_path_layout() {
        let cfg = config();
        let id = ArtifactIdentity::dataset("acme/widgets")
            .with_variant("small")
            .with_revision("v1");

        let private = local_path(&id, None, Visibility::Private, &cfg);
        assert_eq!(private, Path::new("/cache/datasets_store/acme_widgets/small/v1"));

        let public = local_path(&id, None, Visibility::Public, &cfg);
        assert_eq!(public, Path::new("/cache/datasets_store/public/acme_widgets/small/v1"));

        let scope = BucketScope::bucket("b1");
        let scoped = local_path(&id, Some(&scope), Visibility::Private, &cfg);
        assert_eq!(
            scoped,
            Path::new("/cache/datasets_store/by_bucket/b1/acme_widgets/small/v1")
        );
    }

    #[test]
    fn test_local_path_defaults_and_model_root() {
        let cfg = config();
        let id = ArtifactIdentity::model("acme/bert");
        let path = local_path(&id, None, Visibility::Private, &cfg);
        assert_eq!(
            path,
            Path::new("/cache/models_store/acme_bert/default_config/default_revision")
        );
    }

    #[test]
    fn test_object_key_layout() {
        let cfg = config();
        let id = ArtifactIdentity::dataset("acme/widgets");
        assert_eq!(
            object_key(&id, None, &cfg),
            "acme_widgets/default_config/default_revision"
        );
        assert_eq!(
            object_key(&id, Some("/team/"), &cfg),
            "team/acme_widgets/default_config/default_revision"
        );

        let model = ArtifactIdentity::model("acme/widgets").with_revision("main");
        assert_eq!(
            object_key(&model, Some("team"), &cfg),
            "team/models/acme_widgets/default_config/main"
        );
    }

    #[test]
    fn test_paths_are_deterministic() {
        let cfg = config();
        let scope = BucketScope::new("b1", Some("http://localhost:9000"), Some("p"));
        let id = ArtifactIdentity::dataset("org/set").with_revision("abc");
        for visibility in [Visibility::Public, Visibility::Private] {
            assert_eq!(
                local_path(&id, Some(&scope), visibility, &cfg),
                local_path(&id.clone(), Some(&scope.clone()), visibility, &cfg)
            );
        }
        assert_eq!(
            object_key(&id, scope.data_prefix(), &cfg),
            object_key(&id, scope.data_prefix(), &cfg)
        );
    }

    #[test]
    fn test_manifest_and_zip_keys() {
        let cfg = config();
        let id = ArtifactIdentity::dataset("acme/widgets");
        assert_eq!(
            manifest_entry_key(&id, &cfg),
            "acme/widgets---default_config---default_revision"
        );
        assert_eq!(
            public_zip_key(&id, &cfg),
            "public_datasets_zip/acme_widgets---default_config---default_revision.zip"
        );
        assert_eq!(
            prefixed_key(&public_zip_key(&id, &cfg), Some("p/")),
            "p/public_datasets_zip/acme_widgets---default_config---default_revision.zip"
        );
    }

    #[test]
    fn test_scan_base_prefix() {
        assert_eq!(scan_base_prefix(ArtifactKind::Dataset, None), "");
        assert_eq!(scan_base_prefix(ArtifactKind::Dataset, Some("p")), "p/");
        assert_eq!(scan_base_prefix(ArtifactKind::Model, None), "models/");
        assert_eq!(scan_base_prefix(ArtifactKind::Model, Some("/p/")), "p/models/");
    }

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let root = Path::new("/cache/x");
        assert_eq!(
            relative_key(root, &root.join("train").join("data.arrow")).as_deref(),
            Some("train/data.arrow")
        );
        assert_eq!(relative_key(root, root), None);
        assert_eq!(relative_key(root, Path::new("/elsewhere")), None);
    }
}
