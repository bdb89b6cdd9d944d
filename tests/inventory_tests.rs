//! Local and remote listings.

mod common;

use common::{dataset_bundle, Harness};
use hgloc::{AccessMode, ArtifactIdentity, ArtifactKind, DirectoryBundle, PublishOptions, RemoteSource, Visibility};

const PUBLIC: PublishOptions = PublishOptions {
    force_public: true,
    skip_remote_upload: false,
};

#[test]
fn test_scan_remote_falls_back_index_then_walk_then_manifest() {
    let harness = Harness::new();
    let widgets = dataset_bundle();
    let gadgets = dataset_bundle();
    let a = ArtifactIdentity::dataset("acme/widgets").with_revision("v1");
    let b = ArtifactIdentity::dataset("acme/gadgets");
    assert!(harness.cache.publish(&DirectoryBundle::new(widgets.path()), &a, PUBLIC).success);
    assert!(harness
        .cache
        .publish(&DirectoryBundle::new(gadgets.path()), &b, PublishOptions::default())
        .success);

    let indexed = harness.cache.scan_remote(ArtifactKind::Dataset);
    assert_eq!(indexed.len(), 2);
    assert!(indexed.iter().all(|e| e.source == RemoteSource::PrivateIndex));
    assert!(indexed.iter().all(|e| e.card_url.is_some()));

    assert!(harness.remote.remove("private_datasets_index.json"));
    let walked = harness.cache.scan_remote(ArtifactKind::Dataset);
    assert_eq!(walked.len(), 2);
    assert!(walked.iter().all(|e| e.source == RemoteSource::PrefixWalk));
    let mut names: Vec<_> = walked.iter().map(|e| e.identity.clone()).collect();
    names.sort_by(|x, y| x.namespace.cmp(&y.namespace));
    assert_eq!(names, vec![b.clone(), a.clone()]);

    let anonymous = harness.sibling(false);
    let public = anonymous.cache.scan_remote(ArtifactKind::Dataset);
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].identity, a);
    assert_eq!(public[0].source, RemoteSource::PublicManifest);
    assert!(public[0].card_url.is_none());
}

#[test]
fn test_prefix_walk_skips_models_and_zip_dirs() {
    let harness = Harness::new();
    let widgets = dataset_bundle();
    let a = ArtifactIdentity::dataset("acme/widgets");
    assert!(harness.cache.publish(&DirectoryBundle::new(widgets.path()), &a, PUBLIC).success);
    harness
        .remote
        .insert("models/acme_bert/default_config/default_revision/config.json", "{}", false);
    // Incomplete prefix without marker files.
    harness
        .remote
        .insert("acme_partial/default_config/default_revision/shard-0.arrow", "x", false);
    assert!(harness.remote.remove("private_datasets_index.json"));

    let walked = harness.cache.scan_remote(ArtifactKind::Dataset);
    assert_eq!(walked.len(), 1);
    assert_eq!(walked[0].identity, a);

    let models = harness.cache.scan_remote(ArtifactKind::Model);
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].identity, ArtifactIdentity::model("acme/bert"));
}

#[test]
fn test_scan_local_reports_visibility_and_bucket() {
    let harness = Harness::new();
    let widgets = dataset_bundle();
    let a = ArtifactIdentity::dataset("acme/widgets").with_variant("small");
    let outcome = harness.cache.publish(
        &DirectoryBundle::new(widgets.path()),
        &a,
        PublishOptions {
            force_public: true,
            skip_remote_upload: true,
        },
    );
    assert!(outcome.success);

    let entries = harness.cache.scan_local(ArtifactKind::Dataset, AccessMode::PublicOnly, true);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].identity, a);
    assert_eq!(entries[0].visibility, Visibility::Public);
    assert_eq!(entries[0].bucket.as_deref(), Some("b1"));
    assert_eq!(Some(entries[0].path.clone()), outcome.path);
}

#[test]
fn test_scan_local_lists_bucket_scoped_and_legacy_layouts_together() {
    let harness = Harness::new();
    let widgets = dataset_bundle();
    let scoped = ArtifactIdentity::dataset("acme/widgets");
    let outcome = harness.cache.publish(
        &DirectoryBundle::new(widgets.path()),
        &scoped,
        PublishOptions {
            force_public: false,
            skip_remote_upload: true,
        },
    );
    assert!(outcome.success);

    // Cached before a bucket was configured: flat layout, no metadata.
    let legacy_dir = harness
        .store_root()
        .join("datasets_store/acme_legacy/default_config/default_revision");
    std::fs::create_dir_all(&legacy_dir).unwrap();
    std::fs::write(legacy_dir.join("dataset_info.json"), b"{}").unwrap();

    let all = harness.cache.scan_local(ArtifactKind::Dataset, AccessMode::Any, false);
    let listed: Vec<_> = all
        .iter()
        .map(|e| (e.identity.namespace.as_str(), e.bucket.as_deref()))
        .collect();
    assert_eq!(listed, vec![("acme/legacy", None), ("acme/widgets", Some("b1"))]);
    assert_eq!(all[0].path, legacy_dir);

    let scoped_only = harness.cache.scan_local(ArtifactKind::Dataset, AccessMode::Any, true);
    assert_eq!(scoped_only.len(), 1);
    assert_eq!(scoped_only[0].identity, scoped);
}
