use std::collections::HashMap;

use crate::models::Image;
use crate::retention::Classified;

/// Digests referenced by at least one tag that is not a deletion candidate,
/// with the tags that protect them in classification order.
#[derive(Debug, Default)]
pub struct ProtectionSet {
    protectors: HashMap<String, Vec<String>>,
}

impl ProtectionSet {
    pub fn from_classified(classified: &[Classified]) -> Self {
        let mut protectors: HashMap<String, Vec<String>> = HashMap::new();
        for c in classified.iter().filter(|c| !c.class.is_candidate()) {
            protectors
                .entry(c.image.digest.clone())
                .or_default()
                .push(c.image.tag.clone());
        }
        Self { protectors }
    }

    /// Protecting tag names joined for display, e.g. `latest, v2`.
    pub fn protected_by(&self, digest: &str) -> Option<String> {
        self.protectors
            .get(digest)
            .filter(|tags| !tags.is_empty())
            .map(|tags| tags.join(", "))
    }
}

/// A deletion candidate whose digest is still needed by a retained tag.
#[derive(Debug, Clone)]
pub struct ProtectedCandidate {
    pub image: Image,
    pub protected_by: String,
}

/// Deletion candidates split by digest safety, both in classification order.
#[derive(Debug, Default)]
pub struct SafetyPlan {
    pub protected: Vec<ProtectedCandidate>,
    pub deletable: Vec<Image>,
}

/// Split the deletion candidates of one repository into those that are safe
/// to delete and those whose digest is shared with a retained tag.
pub fn guard(classified: &[Classified]) -> SafetyPlan {
    let protection = ProtectionSet::from_classified(classified);
    let mut plan = SafetyPlan::default();

    for c in classified.iter().filter(|c| c.class.is_candidate()) {
        match protection.protected_by(&c.image.digest) {
            Some(protected_by) => {
                tracing::info!(
                    repo = %c.image.repository,
                    tag = %c.image.tag,
                    digest = %c.image.digest,
                    also_used_by = %protected_by,
                    "Underlying image is also used by non-deletable tags - skipping deletion"
                );
                plan.protected.push(ProtectedCandidate {
                    image: c.image.clone(),
                    protected_by,
                });
            }
            None => plan.deletable.push(c.image.clone()),
        }
    }

    plan
}
