use std::fmt;

use chrono::{DateTime, Utc};

use crate::filter::TagFilter;
use crate::models::Image;

/// Run-wide retention rules applied to every repository.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub tag_filter: TagFilter,
    pub deadline: DateTime<Utc>,
    pub latest: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Tag name did not pass the include/exclude patterns.
    Ignored,
    /// Among the `latest` most recent matching tags.
    RetainedRecency,
    /// Outside the recency window but created on or after the deadline.
    RetainedNotExpired,
    /// Expired and outside the recency window.
    DeletionCandidate,
}

impl Classification {
    pub fn is_candidate(self) -> bool {
        self == Classification::DeletionCandidate
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Ignored => "ignored",
            Classification::RetainedRecency => "retained (latest)",
            Classification::RetainedNotExpired => "retained (not expired)",
            Classification::DeletionCandidate => "deletion candidate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Classified {
    pub image: Image,
    pub class: Classification,
}

impl RetentionPolicy {
    pub fn is_expired(&self, image: &Image) -> bool {
        image.created_at < self.deadline
    }

    /// Classify a repository's images.
    ///
    /// The result is sorted by creation time ascending; ties keep fetch order.
    /// Classification walks newest to oldest with one counter shared by
    /// recency-retained and not-yet-expired tags.
    pub fn classify(&self, mut images: Vec<Image>) -> Vec<Classified> {
        images.sort_by_key(|img| img.created_at);

        let mut classes = vec![Classification::Ignored; images.len()];
        let mut retained = 0usize;

        for (idx, image) in images.iter().enumerate().rev() {
            if !self.tag_filter.matches(&image.tag) {
                continue;
            }
            classes[idx] = if retained < self.latest {
                retained += 1;
                Classification::RetainedRecency
            } else if !self.is_expired(image) {
                retained += 1;
                Classification::RetainedNotExpired
            } else {
                Classification::DeletionCandidate
            };
        }

        images
            .into_iter()
            .zip(classes)
            .map(|(image, class)| Classified { image, class })
            .collect()
    }
}
