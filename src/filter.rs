use regex::Regex;

use crate::error::AppError;

/// Decides which repositories proceed to tag collection.
#[derive(Debug, Clone)]
pub struct RepositoryFilter {
    pattern: Regex,
}

impl RepositoryFilter {
    pub fn new(pattern: &str) -> Result<Self, AppError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, repository: &str) -> bool {
        self.pattern.is_match(repository)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Include/exclude pattern pair applied to tag names.
#[derive(Debug, Clone)]
pub struct TagFilter {
    include: Regex,
    exclude: Option<Regex>,
}

impl TagFilter {
    /// An empty `exclude` disables the exclusion pattern.
    pub fn new(include: &str, exclude: &str) -> Result<Self, AppError> {
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(Regex::new(exclude)?)
        };
        Ok(Self {
            include: Regex::new(include)?,
            exclude,
        })
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.include.is_match(tag) && !self.exclude.as_ref().is_some_and(|re| re.is_match(tag))
    }

    /// Human-readable form used in log lines, e.g. `--tag=^v, --ntag=-rc`.
    pub fn describe(&self) -> String {
        match &self.exclude {
            Some(ex) => format!("--tag={}, --ntag={}", self.include.as_str(), ex.as_str()),
            None => format!("--tag={}", self.include.as_str()),
        }
    }
}
