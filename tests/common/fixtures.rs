//! Bundle fixtures.

use anyhow::{anyhow, Result};
use hgloc::{ArtifactBundle, ArtifactIdentity, DirectoryBundle, OriginFetcher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A dataset bundle: `dataset_info.json`, one data file and a card.
pub fn dataset_bundle() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    std::fs::create_dir_all(dir.path().join("train")).expect("mkdir");
    std::fs::write(dir.path().join("dataset_info.json"), br#"{"features": {}}"#).expect("write");
    std::fs::write(dir.path().join("train/data-00000.arrow"), b"rows").expect("write");
    std::fs::write(dir.path().join("dataset_card.md"), b"# Widgets\n").expect("write");
    dir
}

/// A model bundle: `config.json` and a weights file.
pub fn model_bundle() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("config.json"), br#"{"hidden_size": 8}"#).expect("write");
    std::fs::write(dir.path().join("model.safetensors"), b"weights").expect("write");
    dir
}

/// Writes its marker file, then fails.
pub struct FailingBundle;

impl ArtifactBundle for FailingBundle {
    fn materialize_to(&self, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("dataset_info.json"), b"{}")?;
        Err(anyhow!("disk full while writing shards"))
    }
}

/// Origin serving one directory for every identity and counting fetches.
pub struct StaticOrigin {
    pub source: TempDir,
    pub card: Option<String>,
    pub fetches: AtomicUsize,
}

impl StaticOrigin {
    pub fn new(source: TempDir) -> Self {
        Self {
            source,
            card: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_card(mut self, card: &str) -> Self {
        self.card = Some(card.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl OriginFetcher for StaticOrigin {
    fn fetch(
        &self,
        _identity: &ArtifactIdentity,
        _trust_remote_code: bool,
    ) -> Result<Option<Box<dyn ArtifactBundle>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let bundle: Box<dyn ArtifactBundle> = Box::new(DirectoryBundle::new(self.source.path()));
        Ok(Some(bundle))
    }

    fn fetch_card(&self, _identity: &ArtifactIdentity) -> Option<String> {
        self.card.clone()
    }
}
