use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// GET /v2/_catalog response
#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// GET /v2/<repo>/tags/list response
#[derive(Debug, Deserialize)]
pub struct TagList {
    pub tags: Option<Vec<String>>,
}

/// GET /v2/<repo>/manifests/<digest> (schema2 / OCI image manifest)
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub config: Option<ManifestConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    pub digest: String,
}

/// GET /v2/<repo>/blobs/<config-digest> — image config containing the created timestamp
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub created: Option<DateTime<Utc>>,
}

/// Token endpoint response; registries disagree on the field name.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
    pub access_token: Option<String>,
    /// Seconds the token stays valid
    pub expires_in: Option<u64>,
}

/// Lifetime assumed when the token endpoint does not send `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

impl TokenResponse {
    pub fn lifetime(&self) -> Duration {
        self.expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME)
    }

    pub fn into_token(self) -> Option<String> {
        self.token.or(self.access_token).filter(|t| !t.is_empty())
    }
}

/// One (repository, tag) observation of registry content.
///
/// Several images may share a digest; the digest alone decides what a
/// delete call removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub repository: String,
    pub tag: String,
    pub digest: String,
    pub created_at: DateTime<Utc>,
}
