//! Artifact identities and remote scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which key space an artifact lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Dataset,
    Model,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "dataset",
            ArtifactKind::Model => "model",
        }
    }

    /// JSON field carrying the namespace in manifest and index entries.
    pub fn id_field(&self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "dataset_id",
            ArtifactKind::Model => "model_id",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public (anonymous-readable) vs. private (credential-gated) copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    pub fn from_public_flag(is_public: bool) -> Self {
        if is_public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// The `(namespace, variant, revision)` triple naming one artifact version.
///
/// Empty strings are treated the same as absent values, so `variant: Some("")`
/// never reaches a path or key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub kind: ArtifactKind,
    pub namespace: String,
    pub variant: Option<String>,
    pub revision: Option<String>,
}

impl ArtifactIdentity {
    pub fn new(
        kind: ArtifactKind,
        namespace: impl Into<String>,
        variant: Option<&str>,
        revision: Option<&str>,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            variant: non_empty(variant),
            revision: non_empty(revision),
        }
    }

    /// A dataset identity with default variant and revision.
    pub fn dataset(namespace: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Dataset, namespace, None, None)
    }

    /// A model identity with default variant and revision.
    pub fn model(namespace: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Model, namespace, None, None)
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = non_empty(Some(&variant.into()));
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = non_empty(Some(&revision.into()));
        self
    }

    pub fn variant_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.variant.as_deref().unwrap_or(default)
    }

    pub fn revision_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.revision.as_deref().unwrap_or(default)
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (variant: {}, revision: {})",
            self.kind,
            self.namespace,
            self.variant.as_deref().unwrap_or("default"),
            self.revision.as_deref().unwrap_or("default")
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// One remote target: bucket, optional custom endpoint, optional data prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketScope {
    pub bucket_name: String,
    pub endpoint_url: Option<String>,
    pub data_prefix: Option<String>,
}

impl BucketScope {
    /// Build a scope, normalizing the data prefix (surrounding slashes trimmed,
    /// empty treated as absent).
    pub fn new(
        bucket_name: impl Into<String>,
        endpoint_url: Option<&str>,
        data_prefix: Option<&str>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            endpoint_url: endpoint_url
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            data_prefix: data_prefix
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }

    pub fn bucket(bucket_name: impl Into<String>) -> Self {
        Self::new(bucket_name, None, None)
    }

    pub fn data_prefix(&self) -> Option<&str> {
        self.data_prefix.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }
}

/// Static access key pair. Both halves must be non-empty to count as configured.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_absent() {
        let id = ArtifactIdentity::new(ArtifactKind::Dataset, "acme/widgets", Some(""), Some("v1"));
        assert_eq!(id.variant, None);
        assert_eq!(id.revision.as_deref(), Some("v1"));
        assert_eq!(id.variant_or("default_config"), "default_config");
    }

    #[test]
    fn test_bucket_scope_normalizes_prefix() {
        let scope = BucketScope::new("b1", Some(""), Some("/team/data/"));
        assert_eq!(scope.endpoint_url, None);
        assert_eq!(scope.data_prefix(), Some("team/data"));

        let scope = BucketScope::new("b1", None, Some("///"));
        assert_eq!(scope.data_prefix(), None);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("AKIA", "super-secret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("super-secret"));
        assert!(creds.is_complete());
        assert!(!Credentials::new("AKIA", "").is_complete());
    }
}
