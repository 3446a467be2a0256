use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;

use crate::error::RegistryError;
use crate::models::{TokenResponse, DEFAULT_TOKEN_LIFETIME};

pub const CATALOG_SCOPE: &str = "registry:catalog:*";

pub fn repository_scope(repo: &str) -> String {
    format!("repository:{}:*", repo)
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication scheme announced by the registry on `GET /v2/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    None,
    Basic,
    Bearer { realm: String, service: Option<String> },
}

impl Challenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Option<Self> {
        static PARAM: OnceLock<Regex> = OnceLock::new();
        let param =
            PARAM.get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("static regex"));

        let header = header.trim();
        let (scheme, rest) = header.split_once(' ').unwrap_or((header, ""));
        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut params: HashMap<String, String> = param
            .captures_iter(rest)
            .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
            .collect();
        let realm = params.remove("realm")?;
        Some(Challenge::Bearer {
            realm,
            service: params.remove("service"),
        })
    }

    pub fn from_response(resp: &Response) -> Option<Self> {
        let header = resp.headers().get(WWW_AUTHENTICATE)?.to_str().ok()?;
        Self::parse(header)
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Attaches credentials to outgoing requests according to the challenge.
/// Bearer tokens are cached per scope until they expire.
pub struct Authenticator {
    client: Client,
    challenge: Challenge,
    credentials: Option<Credentials>,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl Authenticator {
    pub fn new(client: Client, challenge: Challenge, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            challenge,
            credentials,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub async fn authorize(
        &self,
        request: RequestBuilder,
        scope: &str,
    ) -> Result<RequestBuilder, RegistryError> {
        match &self.challenge {
            Challenge::None | Challenge::Basic => Ok(self.with_basic(request)),
            Challenge::Bearer { realm, service } => {
                let token = self.token(realm, service.as_deref(), scope).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Drop the cached token for `scope` so the next request fetches a new one.
    pub async fn invalidate(&self, scope: &str) {
        self.tokens.lock().await.remove(scope);
    }

    fn with_basic(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
    ) -> Result<String, RegistryError> {
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(scope) {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
            tracing::debug!(scope, "Bearer token expired");
        }

        tracing::debug!(realm, scope, "Requesting bearer token");
        let mut query = vec![("scope", scope)];
        if let Some(service) = service {
            query.push(("service", service));
        }
        let request = self.with_basic(self.client.get(realm).query(&query));

        let resp = request.send().await.map_err(|e| RegistryError::Request {
            url: realm.to_string(),
            source: e,
        })?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RegistryError::Auth(format!(
                "token endpoint {} rejected credentials ({})",
                realm, status
            )));
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                method: "GET",
                url: realm.to_string(),
                status,
            });
        }

        let body = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| RegistryError::Decode {
                url: realm.to_string(),
                source: e,
            })?;
        let now = Instant::now();
        let expires_at = now
            .checked_add(body.lifetime())
            .unwrap_or(now + DEFAULT_TOKEN_LIFETIME);
        let token = body.into_token().ok_or_else(|| {
            RegistryError::Auth(format!("token endpoint {} returned no token", realm))
        })?;

        tokens.insert(
            scope.to_string(),
            CachedToken {
                token: token.clone(),
                expires_at,
            },
        );
        Ok(token)
    }
}
