//! Filesystem-backed local artifact cache.
//!
//! This crate provides:
//! - `FsBundleStore`: bundle directories with completeness markers and sidecar metadata
//! - `DirectoryBundle`: a directory on disk as an opaque `ArtifactBundle`
//! - `zip_dir` / `unzip`: archive helpers for public bundles

pub mod archive;
pub mod bundle;
pub mod metadata;
pub mod paths;
pub mod store;

pub use archive::{unzip, zip_dir};
pub use bundle::{ArtifactBundle, DirectoryBundle};
pub use metadata::{metadata_path, CacheEntryMetadata};
pub use store::{BundleStore, FsBundleStore};
