use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};

use crate::auth::{repository_scope, Authenticator, Challenge, Credentials, CATALOG_SCOPE};
use crate::error::{AppError, RegistryError};
use crate::models::{Catalog, ImageConfig, Manifest, TagList};

/// Lists and indexes are accepted so a multi-arch tag resolves to its
/// top-level digest instead of the default platform's child manifest.
const MANIFEST_MEDIA_TYPES: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json";

/// Read side of the registry: everything the catalog builder needs.
#[async_trait]
pub trait RegistryRead: Send + Sync {
    /// Up to `limit` repository names in catalog order.
    async fn list_repositories(&self, limit: usize) -> Result<Vec<String>, RegistryError>;

    async fn list_tags(&self, repo: &str) -> Result<Vec<String>, RegistryError>;

    /// Digest of the manifest a tag currently points to.
    async fn get_tag_digest(&self, repo: &str, tag: &str) -> Result<String, RegistryError>;

    async fn get_manifest(&self, repo: &str, digest: &str) -> Result<Manifest, RegistryError>;

    async fn get_image_config(
        &self,
        repo: &str,
        config_digest: &str,
    ) -> Result<ImageConfig, RegistryError>;
}

/// The single mutating capability: delete a manifest by digest.
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), RegistryError>;
}

pub struct RegistryClient {
    client: Client,
    base_url: String,
    auth: Authenticator,
}

impl RegistryClient {
    fn new(client: Client, base_url: &str, auth: Authenticator) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Ping `GET /v2/`, discover the auth scheme and verify the credentials.
    pub async fn connect(
        base_url: &str,
        credentials: Option<Credentials>,
        insecure: bool,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Url::parse(base_url).map_err(|e| {
            AppError::Configuration(format!("invalid registry URL {}: {}", base_url, e))
        })?;

        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        let base = base_url.trim_end_matches('/');
        let ping_url = format!("{}/v2/", base);
        let connectivity = |reason: String| AppError::Connectivity {
            url: base.to_string(),
            reason,
        };

        tracing::debug!(url = %ping_url, "Trying to fetch auth challenges");
        let resp = client
            .get(&ping_url)
            .send()
            .await
            .map_err(|e| connectivity(e.to_string()))?;

        let challenge = match resp.status() {
            s if s.is_success() => Challenge::None,
            StatusCode::UNAUTHORIZED => Challenge::from_response(&resp)
                .ok_or_else(|| connectivity("unsupported authentication challenge".to_string()))?,
            s => return Err(connectivity(format!("GET {} returned status {}", ping_url, s))),
        };
        tracing::debug!(?challenge, "Registry authentication scheme");

        let registry = Self::new(
            client.clone(),
            base,
            Authenticator::new(client, challenge, credentials),
        );

        if *registry.auth.challenge() != Challenge::None {
            registry
                .execute("GET", &ping_url, registry.client.get(&ping_url), CATALOG_SCOPE)
                .await
                .map_err(|e| connectivity(e.to_string()))?;
        }

        Ok(registry)
    }

    /// Authorize, send, and fail on any non-success status.
    ///
    /// A bearer token rejected with 401 is dropped and the request is sent
    /// once more with a fresh one.
    async fn execute(
        &self,
        method: &'static str,
        url: &str,
        request: RequestBuilder,
        scope: &str,
    ) -> Result<Response, RegistryError> {
        tracing::debug!("{} {}", method, url);
        let retry = request.try_clone();
        let mut resp = self.send(url, request, scope).await?;

        if resp.status() == StatusCode::UNAUTHORIZED
            && matches!(self.auth.challenge(), Challenge::Bearer { .. })
        {
            if let Some(retry) = retry {
                tracing::debug!(scope, "Bearer token rejected, re-authenticating");
                self.auth.invalidate(scope).await;
                resp = self.send(url, retry, scope).await?;
            }
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }
        Ok(resp)
    }

    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        scope: &str,
    ) -> Result<Response, RegistryError> {
        self.auth
            .authorize(request, scope)
            .await?
            .send()
            .await
            .map_err(|e| RegistryError::Request {
                url: url.to_string(),
                source: e,
            })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
        scope: &str,
    ) -> Result<(T, Option<String>), RegistryError> {
        let resp = self.execute("GET", url, request, scope).await?;
        let next_link = Self::parse_next_link(&resp);
        let body = resp.json().await.map_err(|e| RegistryError::Decode {
            url: url.to_string(),
            source: e,
        })?;
        Ok((body, next_link))
    }

    /// Parse the Link header for pagination (next URL)
    fn parse_next_link(resp: &Response) -> Option<String> {
        let link = resp.headers().get(LINK)?.to_str().ok()?;
        // Link: </v2/_catalog?n=100&last=xxx>; rel="next"
        if link.contains("rel=\"next\"") {
            let start = link.find('<')? + 1;
            let end = link.find('>')?;
            Some(link[start..end].to_string())
        } else {
            None
        }
    }

    /// Resolve a relative URL path against the base URL
    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl RegistryRead for RegistryClient {
    /// GET /v2/_catalog with pagination, stopping at `limit`
    async fn list_repositories(&self, limit: usize) -> Result<Vec<String>, RegistryError> {
        let mut repos = Vec::new();
        if limit == 0 {
            return Ok(repos);
        }
        let mut url = format!("{}/v2/_catalog?n={}", self.base_url, limit);

        while repos.len() < limit {
            let (catalog, next_link): (Catalog, _) = self
                .get_json(&url, self.client.get(&url), CATALOG_SCOPE)
                .await?;
            repos.extend(catalog.repositories);

            match next_link {
                Some(next) => url = self.resolve_url(&next),
                None => break,
            }
        }

        repos.truncate(limit);
        Ok(repos)
    }

    /// GET /v2/<repo>/tags/list with pagination
    async fn list_tags(&self, repo: &str) -> Result<Vec<String>, RegistryError> {
        let scope = repository_scope(repo);
        let mut tags = Vec::new();
        let mut url = format!("{}/v2/{}/tags/list", self.base_url, repo);

        loop {
            let (tag_list, next_link): (TagList, _) =
                self.get_json(&url, self.client.get(&url), &scope).await?;

            if let Some(t) = tag_list.tags {
                tags.extend(t);
            }

            match next_link {
                Some(next) => url = self.resolve_url(&next),
                None => break,
            }
        }

        Ok(tags)
    }

    /// HEAD /v2/<repo>/manifests/<tag> — extract Docker-Content-Digest header
    async fn get_tag_digest(&self, repo: &str, tag: &str) -> Result<String, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, tag);
        let request = self.client.head(&url).header(ACCEPT, MANIFEST_MEDIA_TYPES);
        let resp = self
            .execute("HEAD", &url, request, &repository_scope(repo))
            .await?;

        resp.headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| RegistryError::MissingDigest(format!("{}:{}", repo, tag)))
    }

    /// GET /v2/<repo>/manifests/<digest>
    async fn get_manifest(&self, repo: &str, digest: &str) -> Result<Manifest, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, digest);
        let request = self.client.get(&url).header(ACCEPT, MANIFEST_MEDIA_TYPES);
        let (manifest, _) = self
            .get_json(&url, request, &repository_scope(repo))
            .await?;
        Ok(manifest)
    }

    /// GET /v2/<repo>/blobs/<config_digest>
    async fn get_image_config(
        &self,
        repo: &str,
        config_digest: &str,
    ) -> Result<ImageConfig, RegistryError> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url, repo, config_digest);
        let (config, _) = self
            .get_json(&url, self.client.get(&url), &repository_scope(repo))
            .await?;
        Ok(config)
    }
}

#[async_trait]
impl Deleter for RegistryClient {
    /// DELETE /v2/<repo>/manifests/<digest>
    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, digest);
        let request = self.client.delete(&url).header(ACCEPT, MANIFEST_MEDIA_TYPES);
        self.execute("DELETE", &url, request, &repository_scope(repo))
            .await?;
        Ok(())
    }
}
