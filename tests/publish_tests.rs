//! Write path: publish, acquire and sync.

mod common;

use common::{dataset_bundle, model_bundle, FailingBundle, Harness, StaticOrigin};
use hgloc::{
    AccessMode, AcquireOptions, ArtifactBundle, ArtifactIdentity, BucketScope, DirectoryBundle,
    PublishOptions, Resolution, Tier, Visibility,
};
use serde_json::json;

const PUBLIC: PublishOptions = PublishOptions {
    force_public: true,
    skip_remote_upload: false,
};

const LOCAL_ONLY: PublishOptions = PublishOptions {
    force_public: false,
    skip_remote_upload: true,
};

#[test]
fn test_public_publish_uploads_private_copy_zip_and_manifest_entry() {
    let harness = Harness::new();
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets");

    let outcome = harness.cache.publish(&DirectoryBundle::new(src.path()), &id, PUBLIC);
    assert!(outcome.success, "{}", outcome.message);
    let path = outcome.path.unwrap();
    assert!(path.starts_with(harness.store_root().join("datasets_store/public/by_bucket/b1")));

    let remote = &harness.remote;
    assert!(remote
        .peek("acme_widgets/default_config/default_revision/train/data-00000.arrow")
        .is_some());
    assert_eq!(
        remote.is_public("acme_widgets/default_config/default_revision/dataset_info.json"),
        Some(false)
    );
    let zip_key = "public_datasets_zip/acme_widgets---default_config---default_revision.zip";
    assert_eq!(remote.is_public(zip_key), Some(true));

    let manifest = harness.manifest_json("public_datasets.json");
    assert_eq!(
        manifest["acme/widgets---default_config---default_revision"],
        json!({
            "dataset_id": "acme/widgets",
            "config_name": null,
            "revision": null,
            "s3_zip_key": zip_key,
            "s3_bucket": "b1",
        })
    );

    let index = harness.manifest_json("private_datasets_index.json");
    assert_eq!(
        index["acme/widgets---default_config---default_revision"]["s3_prefix"],
        "acme_widgets/default_config/default_revision"
    );
    assert_eq!(remote.is_public("private_datasets_index.json"), Some(false));
    assert_eq!(harness.cache.metrics().snapshot().publishes, 1);
}

#[test]
fn test_republish_transfers_nothing() {
    let harness = Harness::new();
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets").with_revision("v1");
    let bundle = DirectoryBundle::new(src.path());
    assert!(harness.cache.publish(&bundle, &id, PUBLIC).success);

    harness.remote.reset_counts();
    let again = harness.cache.publish(&bundle, &id, PUBLIC);
    assert!(again.success, "{}", again.message);
    assert_eq!(harness.remote.call_counts().put, 0);
}

#[test]
fn test_manifest_keeps_distinct_identities() {
    let harness = Harness::new();
    let widgets = dataset_bundle();
    let gadgets = dataset_bundle();
    let a = ArtifactIdentity::dataset("acme/widgets");
    let b = ArtifactIdentity::dataset("acme/gadgets").with_variant("small");

    assert!(harness.cache.publish(&DirectoryBundle::new(widgets.path()), &a, PUBLIC).success);
    assert!(harness.cache.publish(&DirectoryBundle::new(gadgets.path()), &b, PUBLIC).success);

    let manifest = harness.manifest_json("public_datasets.json");
    let keys: Vec<&String> = manifest.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec![
            "acme/gadgets---small---default_revision",
            "acme/widgets---default_config---default_revision",
        ]
    );
}

#[test]
fn test_failed_private_upload_fails_publish_but_keeps_local_copy() {
    let harness = Harness::new();
    harness.remote.fail_puts_under("acme_widgets/");
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets");

    let outcome = harness.cache.publish(&DirectoryBundle::new(src.path()), &id, PUBLIC);
    assert!(!outcome.success);
    let path = outcome.path.expect("local save reported");
    assert!(path.join("dataset_info.json").is_file());
    assert!(harness.remote.peek("public_datasets.json").is_none());
    assert_eq!(harness.cache.metrics().snapshot().publish_failures, 1);
}

#[test]
fn test_failed_public_zip_is_reported_not_fatal() {
    let harness = Harness::new();
    harness.remote.fail_puts_under("public_models_zip/");
    let src = model_bundle();
    let id = ArtifactIdentity::model("acme/bert");

    let outcome = harness.cache.publish(&DirectoryBundle::new(src.path()), &id, PUBLIC);
    assert!(outcome.success);
    assert!(outcome.message.contains("failed"), "{}", outcome.message);
    assert!(harness
        .remote
        .peek("models/acme_bert/default_config/default_revision/config.json")
        .is_some());
    assert!(harness.remote.peek("public_models.json").is_none());
}

#[test]
fn test_acquire_fetches_once_and_saves_card() {
    let harness = Harness::new();
    let origin = StaticOrigin::new(model_bundle()).with_card("# BERT\n");
    let id = ArtifactIdentity::model("acme/bert").with_revision("main");

    let first = harness
        .cache
        .acquire(&id, &origin, AcquireOptions::default())
        .unwrap()
        .into_artifact()
        .unwrap();
    assert_eq!(first.tier, Tier::Origin);
    assert_eq!(first.visibility, Visibility::Private);
    assert_eq!(std::fs::read_to_string(first.path.join("model_card.md")).unwrap(), "# BERT\n");
    assert!(harness
        .remote
        .peek("models/acme_bert/default_config/main/model_card.md")
        .is_some());

    let second = harness
        .cache
        .acquire(&id, &origin, AcquireOptions::default())
        .unwrap()
        .into_artifact()
        .unwrap();
    assert_eq!(second.tier, Tier::LocalPrivate);
    assert_eq!(origin.fetch_count(), 1);
    assert_eq!(harness.cache.card_content(&id, None).as_deref(), Some("# BERT\n"));
}

#[test]
fn test_acquire_public_promotes_remote_private_copy_without_origin() {
    let publisher = Harness::new();
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets");
    assert!(publisher
        .cache
        .publish(&DirectoryBundle::new(src.path()), &id, PublishOptions::default())
        .success);
    assert!(publisher.remote.peek("public_datasets.json").is_none());

    let reader = publisher.sibling(true);
    let origin = StaticOrigin::new(dataset_bundle());
    let options = AcquireOptions {
        make_public: true,
        ..AcquireOptions::default()
    };
    let artifact = reader
        .cache
        .acquire(&id, &origin, options)
        .unwrap()
        .into_artifact()
        .unwrap();
    assert_eq!(origin.fetch_count(), 0);
    assert_eq!(artifact.tier, Tier::RemotePrivate);
    assert_eq!(artifact.visibility, Visibility::Public);
    assert!(artifact
        .path
        .starts_with(reader.store_root().join("datasets_store/public/by_bucket/b1")));
    assert!(artifact.path.join("train/data-00000.arrow").is_file());

    let zip_key = "public_datasets_zip/acme_widgets---default_config---default_revision.zip";
    assert_eq!(reader.remote.is_public(zip_key), Some(true));
    let manifest = reader.manifest_json("public_datasets.json");
    assert_eq!(
        manifest["acme/widgets---default_config---default_revision"]["s3_zip_key"],
        zip_key
    );

    let again = reader.cache.acquire(&id, &origin, options).unwrap().into_artifact().unwrap();
    assert_eq!(again.tier, Tier::LocalPublic);
    assert_eq!(origin.fetch_count(), 0);
}

#[test]
fn test_acquire_rolls_back_failed_save() {
    let harness = Harness::new();
    let id = ArtifactIdentity::dataset("acme/broken");
    let origin = |_: &ArtifactIdentity, _: bool| -> anyhow::Result<Option<Box<dyn ArtifactBundle>>> {
        Ok(Some(Box::new(FailingBundle) as Box<dyn ArtifactBundle>))
    };

    assert!(harness
        .cache
        .acquire(&id, &origin, AcquireOptions::default())
        .is_err());
    let path = harness
        .store_root()
        .join("datasets_store/by_bucket/b1/acme_broken/default_config/default_revision");
    assert!(!path.exists());
    assert!(harness.remote.keys().is_empty());
}

#[test]
fn test_acquire_missing_at_origin_is_not_found() {
    let harness = Harness::new();
    let id = ArtifactIdentity::dataset("acme/ghost");
    let origin = |_: &ArtifactIdentity, _: bool| -> anyhow::Result<Option<Box<dyn ArtifactBundle>>> {
        Ok(None)
    };
    let resolution = harness
        .cache
        .acquire(&id, &origin, AcquireOptions::default())
        .unwrap();
    assert_eq!(resolution, Resolution::NotFound);
}

#[test]
fn test_sync_to_remote_uploads_only_when_absent() {
    let harness = Harness::new();
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets").with_revision("v3");
    assert!(harness.cache.publish(&DirectoryBundle::new(src.path()), &id, LOCAL_ONLY).success);
    assert!(harness.remote.keys().is_empty());

    let outcome = harness.cache.sync_to_remote(&id, false);
    assert!(outcome.success, "{}", outcome.message);
    assert!(harness
        .remote
        .peek("acme_widgets/default_config/v3/dataset_info.json")
        .is_some());

    harness.remote.reset_counts();
    assert!(harness.cache.sync_to_remote(&id, false).success);
    assert_eq!(harness.remote.call_counts().put, 0);

    let published = harness.cache.sync_to_remote(&id, true);
    assert!(published.success);
    assert!(harness
        .remote
        .peek("public_datasets_zip/acme_widgets---default_config---v3.zip")
        .is_some());
}

#[test]
fn test_sync_requires_remote_and_local_copy() {
    let harness = Harness::new();
    let id = ArtifactIdentity::dataset("acme/widgets");
    assert!(!harness.cache.sync_to_remote(&id, false).success);

    let anonymous = harness.sibling(false);
    let src = dataset_bundle();
    assert!(anonymous
        .cache
        .publish(&DirectoryBundle::new(src.path()), &id, LOCAL_ONLY)
        .success);
    assert!(!anonymous.cache.sync_to_remote(&id, false).success);
}

#[test]
fn test_sync_all_pushes_every_scoped_bundle() {
    let harness = Harness::for_scope(BucketScope::new("b1", None, Some("team")));
    let widgets = dataset_bundle();
    let bert = model_bundle();
    let dataset = ArtifactIdentity::dataset("acme/widgets");
    let model = ArtifactIdentity::model("acme/bert");
    assert!(harness.cache.publish(&DirectoryBundle::new(widgets.path()), &dataset, LOCAL_ONLY).success);
    assert!(harness.cache.publish(&DirectoryBundle::new(bert.path()), &model, LOCAL_ONLY).success);

    let summary = harness.cache.sync_all_to_remote(false);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert!(harness
        .remote
        .peek("team/acme_widgets/default_config/default_revision/dataset_info.json")
        .is_some());
    assert!(harness
        .remote
        .peek("team/models/acme_bert/default_config/default_revision/config.json")
        .is_some());
}

#[test]
fn test_card_lookup_downloads_single_object() {
    let publisher = Harness::new();
    let src = dataset_bundle();
    let id = ArtifactIdentity::dataset("acme/widgets");
    assert!(publisher
        .cache
        .publish(&DirectoryBundle::new(src.path()), &id, PublishOptions::default())
        .success);

    let reader = publisher.sibling(true);
    reader.cache.client().expect("client");
    reader.remote.reset_counts();
    assert_eq!(reader.cache.card_content(&id, None).as_deref(), Some("# Widgets\n"));
    assert_eq!(reader.remote.call_counts().get, 1);
    // A lone card does not make the private copy complete.
    let artifact = reader.cache.resolve(&id, AccessMode::Any).into_artifact().unwrap();
    assert_eq!(artifact.tier, Tier::RemotePrivate);

    let url = reader.cache.card_presigned_url(&id, None, None).unwrap();
    assert!(url.contains("acme_widgets/default_config/default_revision/dataset_card.md"));
    assert!(reader
        .cache
        .card_presigned_url(&id, Some("missing.md"), None)
        .is_none());
}
