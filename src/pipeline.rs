use futures::stream::{self, StreamExt};

use crate::catalog::build_catalog;
use crate::config::RunConfig;
use crate::error::AppError;
use crate::executor::{Executor, TagDecision};
use crate::guard::guard;
use crate::models::Image;
use crate::registry::{Deleter, RegistryRead};
use crate::retention::{Classification, Classified};

#[derive(Debug)]
pub enum RepoStatus {
    /// Repository name did not match `--repo`; its tags were never fetched.
    Filtered,
    /// Catalog discarded after a fetch error; no decisions were made.
    FetchFailed(String),
    NoMatchingTags,
    Evaluated {
        classified: Vec<Classified>,
        decisions: Vec<TagDecision>,
    },
}

#[derive(Debug)]
pub struct RepoReport {
    pub repository: String,
    pub status: RepoStatus,
}

/// Classify, guard and execute deletions for one repository's images.
pub async fn evaluate<D>(
    deleter: &D,
    repo: &str,
    images: Vec<Image>,
    config: &RunConfig,
) -> RepoStatus
where
    D: Deleter + ?Sized,
{
    let policy = &config.retention;
    let classified = policy.classify(images);

    if classified.iter().all(|c| c.class == Classification::Ignored) {
        tracing::debug!(repo, "Ignore repository with no matching tags");
        return RepoStatus::NoMatchingTags;
    }

    for c in &classified {
        let tag = c.image.tag.as_str();
        let created = c.image.created_at;
        match c.class {
            Classification::Ignored => tracing::info!(
                repo,
                tag,
                filter = %policy.tag_filter.describe(),
                "Ignore non matching tag"
            ),
            Classification::RetainedRecency => tracing::info!(
                repo,
                tag,
                %created,
                latest = policy.latest,
                "Keep latest matching tag"
            ),
            Classification::RetainedNotExpired => {
                tracing::info!(repo, tag, %created, "Tag not outdated")
            }
            Classification::DeletionCandidate => {
                tracing::info!(repo, tag, %created, "Marking tag as outdated")
            }
        }
    }

    let plan = guard(&classified);
    let decisions = Executor::new(deleter, config.dry_run).execute(plan).await;

    RepoStatus::Evaluated {
        classified,
        decisions,
    }
}

/// Process one repository end to end. Never fails: errors are absorbed into
/// the report.
pub async fn process_repository<R>(registry: &R, repo: &str, config: &RunConfig) -> RepoReport
where
    R: RegistryRead + Deleter + ?Sized,
{
    let report = |status| RepoReport {
        repository: repo.to_string(),
        status,
    };

    if !config.repository_filter.matches(repo) {
        tracing::debug!(
            repo,
            filter = config.repository_filter.as_str(),
            "Ignore non matching repository"
        );
        return report(RepoStatus::Filtered);
    }

    let images = match build_catalog(registry, repo, config.tag_concurrency).await {
        Ok(images) => images,
        Err(e) => {
            tracing::error!(
                repo,
                error = %e,
                "Error obtaining tag data - skipping this repository"
            );
            return report(RepoStatus::FetchFailed(e.to_string()));
        }
    };

    report(evaluate(registry, repo, images, config).await)
}

/// Fetch the repository list and process every repository, at most
/// `repository_jobs` at a time. Reports come back in catalog order.
pub async fn run<R>(registry: &R, config: &RunConfig) -> Result<Vec<RepoReport>, AppError>
where
    R: RegistryRead + Deleter + ?Sized,
{
    let repos = registry
        .list_repositories(config.max_repositories)
        .await
        .map_err(|e| AppError::Connectivity {
            url: config.registry.clone(),
            reason: format!("error while fetching repositories: {}", e),
        })?;
    tracing::info!(count = repos.len(), entries = ?repos, "Successfully fetched repositories");

    let reports: Vec<RepoReport> = stream::iter(repos)
        .map(|repo| async move { process_repository(registry, &repo, config).await })
        .buffered(config.repository_jobs.max(1))
        .collect()
        .await;

    Ok(reports)
}
