//! hgloc: multi-tier cache for versioned dataset and model bundles
//!
//! Resolves an artifact identity through, in order:
//!
//! - **Local public / local private**: bundle directories under the store roots
//! - **Remote private**: a credentialed S3-compatible bucket
//! - **Public manifest**: zips listed in a public-read JSON index, fetched anonymously
//! - **Origin**: an upstream hub, only via [`ArtifactCache::acquire`]
//!
//! See [`ArtifactCache`] for the entry points and [`CacheConfig`] for configuration.

pub mod inventory;
pub mod locks;
pub mod manifest;
pub mod metrics;
pub mod origin;
pub mod resolver;

pub use inventory::{InventoryEntry, RemoteEntry, RemoteSource};
pub use manifest::{ManifestEntry, ManifestSync, PrivateIndexEntry};
pub use metrics::{MetricsSnapshot, ResolveMetrics};
pub use origin::OriginFetcher;
pub use resolver::{
    AccessMode, AcquireOptions, ArtifactCache, ArtifactCacheBuilder, LocalArtifact,
    PublishOptions, PublishOutcome, Resolution, SyncSummary, Tier,
};

pub use hgloc_cache::{ArtifactBundle, DirectoryBundle};
pub use hgloc_transport::{MemoryObjectStore, ObjectStore, ObjectStoreClient, PublicHttp};
pub use hgloc_types::{ArtifactIdentity, ArtifactKind, BucketScope, CacheConfig, Credentials, Visibility};
