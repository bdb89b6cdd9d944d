//! The origin hub collaborator.
//!
//! Only [`ArtifactCache::acquire`](crate::ArtifactCache::acquire) calls into an
//! origin; every other operation works from the cache tiers alone.

use anyhow::Result;
use hgloc_cache::ArtifactBundle;
use hgloc_types::ArtifactIdentity;

/// Fetches artifacts from their upstream hub.
pub trait OriginFetcher: Send + Sync {
    /// Fetch one artifact version. `Ok(None)` means the origin does not have it.
    fn fetch(
        &self,
        identity: &ArtifactIdentity,
        trust_remote_code: bool,
    ) -> Result<Option<Box<dyn ArtifactBundle>>>;

    /// Card (README) text for the artifact, saved next to the bundle when present.
    fn fetch_card(&self, _identity: &ArtifactIdentity) -> Option<String> {
        None
    }
}

impl<F> OriginFetcher for F
where
    F: Fn(&ArtifactIdentity, bool) -> Result<Option<Box<dyn ArtifactBundle>>> + Send + Sync,
{
    fn fetch(
        &self,
        identity: &ArtifactIdentity,
        trust_remote_code: bool,
    ) -> Result<Option<Box<dyn ArtifactBundle>>> {
        self(identity, trust_remote_code)
    }
}
