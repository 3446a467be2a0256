use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{FetchError, RegistryError};
use crate::models::Image;
use crate::registry::RegistryRead;

/// Resolve a single tag into an Image (digest + created timestamp)
pub async fn resolve_image<R>(registry: &R, repo: &str, tag: String) -> Result<Image, FetchError>
where
    R: RegistryRead + ?Sized,
{
    let tag_error = |tag: &str, source: RegistryError| FetchError::Tag {
        repository: repo.to_string(),
        tag: tag.to_string(),
        source,
    };

    tracing::debug!(repo, tag = %tag, "Fetching tag...");
    let digest = registry
        .get_tag_digest(repo, &tag)
        .await
        .map_err(|e| tag_error(&tag, e))?;

    tracing::debug!(repo, tag = %tag, digest = %digest, "Fetching manifest...");
    let manifest = registry
        .get_manifest(repo, &digest)
        .await
        .map_err(|e| tag_error(&tag, e))?;

    let Some(config) = manifest.config else {
        tracing::debug!(
            repo,
            tag = %tag,
            schema_version = manifest.schema_version,
            "Manifest has no config"
        );
        return Err(FetchError::MissingConfig {
            repository: repo.to_string(),
            tag,
        });
    };

    tracing::debug!(repo, tag = %tag, config = %config.digest, "Fetching config blob...");
    let blob = registry
        .get_image_config(repo, &config.digest)
        .await
        .map_err(|e| tag_error(&tag, e))?;

    let Some(created_at) = blob.created else {
        return Err(FetchError::MissingCreated {
            repository: repo.to_string(),
            tag,
        });
    };

    Ok(Image {
        repository: repo.to_string(),
        tag,
        digest,
        created_at,
    })
}

/// Build the complete image list of one repository.
///
/// Up to `concurrency` tags are resolved at once. The result keeps the
/// registry's tag order. Any single failure discards the whole catalog, since
/// a tag that could not be resolved may be the one protecting a digest.
pub async fn build_catalog<R>(
    registry: &R,
    repo: &str,
    concurrency: usize,
) -> Result<Vec<Image>, FetchError>
where
    R: RegistryRead + ?Sized,
{
    let tags = registry
        .list_tags(repo)
        .await
        .map_err(|source| FetchError::Tags {
            repository: repo.to_string(),
            source,
        })?;

    if tags.is_empty() {
        return Ok(Vec::new());
    }

    stream::iter(tags)
        .map(|tag| resolve_image(registry, repo, tag))
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegistry;

    #[tokio::test]
    async fn test_catalog_keeps_tag_order() {
        let registry = FakeRegistry::new()
            .with_image("app", "b", "d2", 10)
            .with_image("app", "a", "d1", 20)
            .with_image("app", "c", "d1", 20);

        let images = build_catalog(&registry, "app", 2).await.unwrap();
        let tags: Vec<&str> = images.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["b", "a", "c"]);
        assert_eq!(images[2].digest, "d1");
        assert_eq!(images[0].repository, "app");
    }

    #[tokio::test]
    async fn test_single_failure_discards_catalog() {
        let registry = FakeRegistry::new()
            .with_image("app", "v1", "d1", 90)
            .with_image("app", "v2", "d2", 80)
            .with_image("app", "v3", "d3", 70)
            .fail_manifest("app", "d3");

        let err = build_catalog(&registry, "app", 4).await.unwrap_err();
        assert!(matches!(err, FetchError::Tag { ref tag, .. } if tag == "v3"));
    }

    #[tokio::test]
    async fn test_missing_created_is_fetch_error() {
        let registry = FakeRegistry::new()
            .with_image("app", "v1", "d1", 90)
            .without_created("d1");

        let err = build_catalog(&registry, "app", 1).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingCreated { .. }));
    }

    #[tokio::test]
    async fn test_missing_config_is_fetch_error() {
        let registry = FakeRegistry::new()
            .with_image("app", "v1", "d1", 90)
            .without_config("d1");

        let err = build_catalog(&registry, "app", 1).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingConfig { .. }));
    }

    #[tokio::test]
    async fn test_tag_listing_failure() {
        let registry = FakeRegistry::new().fail_tags("app");
        let err = build_catalog(&registry, "app", 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Tags { .. }));
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let registry = FakeRegistry::new().with_repository("empty");
        assert!(build_catalog(&registry, "empty", 1).await.unwrap().is_empty());
    }
}
