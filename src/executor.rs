use std::collections::HashSet;
use std::fmt;

use crate::guard::SafetyPlan;
use crate::models::Image;
use crate::registry::Deleter;

/// What happened to one deletion-candidate tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    Deleted,
    /// Dry run: the digest would have been deleted.
    WouldDelete,
    SkippedProtected { protected_by: String },
    /// The digest was already handled for an earlier tag this run.
    SkippedAlreadyProcessed,
    Failed(String),
}

impl fmt::Display for TagOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagOutcome::Deleted => f.write_str("deleted"),
            TagOutcome::WouldDelete => f.write_str("would delete"),
            TagOutcome::SkippedProtected { protected_by } => {
                write!(f, "skipped, digest also used by {}", protected_by)
            }
            TagOutcome::SkippedAlreadyProcessed => f.write_str("skipped, digest already processed"),
            TagOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagDecision {
    pub image: Image,
    pub outcome: TagOutcome,
}

pub struct Executor<'a, D: Deleter + ?Sized> {
    deleter: &'a D,
    dry_run: bool,
}

impl<'a, D: Deleter + ?Sized> Executor<'a, D> {
    pub fn new(deleter: &'a D, dry_run: bool) -> Self {
        Self { deleter, dry_run }
    }

    /// Issue at most one delete per unique digest, oldest candidate first.
    ///
    /// A failed delete is reported and processing continues; it is not
    /// retried this run.
    pub async fn execute(&self, plan: SafetyPlan) -> Vec<TagDecision> {
        let mut decisions: Vec<TagDecision> = plan
            .protected
            .into_iter()
            .map(|p| TagDecision {
                image: p.image,
                outcome: TagOutcome::SkippedProtected {
                    protected_by: p.protected_by,
                },
            })
            .collect();

        let mut processed: HashSet<String> = HashSet::new();

        for image in plan.deletable {
            if !processed.insert(image.digest.clone()) {
                tracing::debug!(
                    repo = %image.repository,
                    tag = %image.tag,
                    digest = %image.digest,
                    "Image under tag already processed"
                );
                decisions.push(TagDecision {
                    image,
                    outcome: TagOutcome::SkippedAlreadyProcessed,
                });
                continue;
            }

            tracing::info!(
                repo = %image.repository,
                tag = %image.tag,
                "All tags for this image digest marked for deletion"
            );

            let outcome = if self.dry_run {
                tracing::info!(
                    repo = %image.repository,
                    tag = %image.tag,
                    digest = %image.digest,
                    created = %image.created_at,
                    "Not actually deleting image (--dry)"
                );
                TagOutcome::WouldDelete
            } else {
                tracing::info!(
                    repo = %image.repository,
                    tag = %image.tag,
                    digest = %image.digest,
                    created = %image.created_at,
                    "Deleting image"
                );
                match self
                    .deleter
                    .delete_manifest(&image.repository, &image.digest)
                    .await
                {
                    Ok(()) => TagOutcome::Deleted,
                    Err(e) => {
                        tracing::error!(
                            repo = %image.repository,
                            tag = %image.tag,
                            digest = %image.digest,
                            error = %e,
                            "Could not delete image"
                        );
                        TagOutcome::Failed(e.to_string())
                    }
                }
            };

            decisions.push(TagDecision { image, outcome });
        }

        decisions
    }
}
