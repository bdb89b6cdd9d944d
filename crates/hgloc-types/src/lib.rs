//! Shared types for the hgloc workspace.
//!
//! This crate holds everything that is pure data or pure naming logic:
//!
//! - [`identity`]: artifact identities, kinds, visibility, bucket scopes
//! - [`naming`]: the Identity & Path Resolver (local paths, object keys, sanitization)
//! - [`config`]: the immutable [`CacheConfig`] passed into every component
//! - [`env_utils`]: typed environment variable parsing used by [`CacheConfig::from_env`]
//!
//! Nothing in here performs I/O except [`CacheConfig::from_env`], which is meant to be
//! called once at the process boundary.

pub mod config;
pub mod env_utils;
pub mod identity;
pub mod naming;

pub use config::{CacheConfig, KindLayout};
pub use identity::{ArtifactIdentity, ArtifactKind, BucketScope, Credentials, Visibility};
pub use naming::{
    bucket_identifier, local_path, manifest_entry_key, object_key, prefixed_key, public_zip_key,
    relative_key, restore_display_name, sanitize, BY_BUCKET_DIR, PUBLIC_DIR,
};
