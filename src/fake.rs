//! In-memory registry used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;

use crate::error::RegistryError;
use crate::models::{ImageConfig, Manifest, ManifestConfig};
use crate::registry::{Deleter, RegistryRead};

#[derive(Default)]
struct State {
    repos: Vec<String>,
    /// repo -> [(tag, digest)] in registry order
    tags: HashMap<String, Vec<(String, String)>>,
    created: HashMap<String, Option<DateTime<Utc>>>,
    without_config: HashSet<String>,
    failing_tags: HashSet<String>,
    failing_manifests: HashSet<(String, String)>,
    failing_deletes: HashSet<String>,
    delete_calls: Vec<(String, String)>,
    tag_calls: Vec<String>,
}

pub struct FakeRegistry {
    now: DateTime<Utc>,
    state: Mutex<State>,
}

fn status(method: &'static str, url: String, status: StatusCode) -> RegistryError {
    RegistryError::Status {
        method,
        url,
        status,
    }
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            now: Utc::now(),
            state: Mutex::new(State::default()),
        }
    }

    fn edit(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_repository(self, repo: &str) -> Self {
        self.edit(|s| {
            if !s.repos.iter().any(|r| r == repo) {
                s.repos.push(repo.to_string());
                s.tags.insert(repo.to_string(), Vec::new());
            }
        })
    }

    /// Tags sharing a digest share its creation time; the last call wins.
    pub fn with_image(self, repo: &str, tag: &str, digest: &str, days_old: i64) -> Self {
        let created = self.now - Duration::days(days_old);
        self.with_repository(repo).edit(|s| {
            s.tags
                .entry(repo.to_string())
                .or_default()
                .push((tag.to_string(), digest.to_string()));
            s.created.insert(digest.to_string(), Some(created));
        })
    }

    pub fn without_created(self, digest: &str) -> Self {
        self.edit(|s| {
            s.created.insert(digest.to_string(), None);
        })
    }

    pub fn without_config(self, digest: &str) -> Self {
        self.edit(|s| {
            s.without_config.insert(digest.to_string());
        })
    }

    pub fn fail_tags(self, repo: &str) -> Self {
        self.with_repository(repo).edit(|s| {
            s.failing_tags.insert(repo.to_string());
        })
    }

    pub fn fail_manifest(self, repo: &str, digest: &str) -> Self {
        self.edit(|s| {
            s.failing_manifests
                .insert((repo.to_string(), digest.to_string()));
        })
    }

    pub fn fail_delete(self, digest: &str) -> Self {
        self.edit(|s| {
            s.failing_deletes.insert(digest.to_string());
        })
    }

    /// Make a digest deletable again after `fail_delete`.
    pub fn allow_delete(&self, digest: &str) {
        self.state.lock().unwrap().failing_deletes.remove(digest);
    }

    /// Every delete call issued, successful or not.
    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    /// Repositories whose tags were listed.
    pub fn tag_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().tag_calls.clone()
    }

    pub fn remaining_tags(&self, repo: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .tags
            .get(repo)
            .map(|tags| tags.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RegistryRead for FakeRegistry {
    async fn list_repositories(&self, limit: usize) -> Result<Vec<String>, RegistryError> {
        let state = self.state.lock().unwrap();
        Ok(state.repos.iter().take(limit).cloned().collect())
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<String>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.tag_calls.push(repo.to_string());
        if state.failing_tags.contains(repo) {
            return Err(status(
                "GET",
                format!("{repo}/tags/list"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        state
            .tags
            .get(repo)
            .map(|tags| tags.iter().map(|(t, _)| t.clone()).collect())
            .ok_or_else(|| status("GET", format!("{repo}/tags/list"), StatusCode::NOT_FOUND))
    }

    async fn get_tag_digest(&self, repo: &str, tag: &str) -> Result<String, RegistryError> {
        let state = self.state.lock().unwrap();
        state
            .tags
            .get(repo)
            .and_then(|tags| tags.iter().find(|(t, _)| t == tag))
            .map(|(_, d)| d.clone())
            .ok_or_else(|| status("HEAD", format!("{repo}/manifests/{tag}"), StatusCode::NOT_FOUND))
    }

    async fn get_manifest(&self, repo: &str, digest: &str) -> Result<Manifest, RegistryError> {
        let state = self.state.lock().unwrap();
        if state
            .failing_manifests
            .contains(&(repo.to_string(), digest.to_string()))
        {
            return Err(status(
                "GET",
                format!("{repo}/manifests/{digest}"),
                StatusCode::BAD_GATEWAY,
            ));
        }
        let config = if state.without_config.contains(digest) {
            None
        } else {
            Some(ManifestConfig {
                digest: format!("config-{digest}"),
            })
        };
        Ok(Manifest {
            schema_version: 2,
            config,
        })
    }

    async fn get_image_config(
        &self,
        repo: &str,
        config_digest: &str,
    ) -> Result<ImageConfig, RegistryError> {
        let state = self.state.lock().unwrap();
        let digest = config_digest.trim_start_matches("config-");
        state
            .created
            .get(digest)
            .map(|created| ImageConfig { created: *created })
            .ok_or_else(|| {
                status(
                    "GET",
                    format!("{repo}/blobs/{config_digest}"),
                    StatusCode::NOT_FOUND,
                )
            })
    }
}

#[async_trait]
impl Deleter for FakeRegistry {
    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        state
            .delete_calls
            .push((repo.to_string(), digest.to_string()));
        let url = format!("{repo}/manifests/{digest}");
        if state.failing_deletes.contains(digest) {
            return Err(status("DELETE", url, StatusCode::INTERNAL_SERVER_ERROR));
        }
        let tags = state
            .tags
            .get_mut(repo)
            .ok_or_else(|| status("DELETE", url.clone(), StatusCode::NOT_FOUND))?;
        let before = tags.len();
        tags.retain(|(_, d)| d != digest);
        if tags.len() == before {
            return Err(status("DELETE", url, StatusCode::NOT_FOUND));
        }
        Ok(())
    }
}
