use std::time::Duration;

use chrono::{DateTime, Days, Months, Utc};

use crate::auth::Credentials;
use crate::cli::Cli;
use crate::error::AppError;
use crate::filter::{RepositoryFilter, TagFilter};
use crate::retention::RetentionPolicy;

/// Run configuration, fixed before the first registry call.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub registry: String,
    pub max_repositories: usize,
    pub repository_filter: RepositoryFilter,
    pub retention: RetentionPolicy,
    pub dry_run: bool,
    pub insecure: bool,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
    pub tag_concurrency: usize,
    pub repository_jobs: usize,
}

impl RunConfig {
    /// Build the configuration from CLI arguments.
    ///
    /// `prompt` supplies the password when a user name is given without one.
    pub fn from_cli<F>(cli: &Cli, now: DateTime<Utc>, prompt: F) -> Result<Self, AppError>
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        if cli.concurrency == 0 {
            return Err(AppError::Configuration(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        if cli.jobs == 0 {
            return Err(AppError::Configuration("--jobs must be at least 1".to_string()));
        }
        if cli.timeout == 0 {
            return Err(AppError::Configuration("--timeout must be at least 1".to_string()));
        }

        let credentials = match (cli.user.as_deref(), cli.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some(Credentials {
                    username: user.to_string(),
                    password: password.to_string(),
                })
            }
            (Some(user), _) if !user.is_empty() => {
                let password = prompt().map_err(|e| {
                    AppError::Configuration(format!("could not read password: {}", e))
                })?;
                Some(Credentials {
                    username: user.to_string(),
                    password,
                })
            }
            _ => None,
        };

        Ok(Self {
            registry: cli.registry.clone(),
            max_repositories: cli.max_repositories,
            repository_filter: RepositoryFilter::new(&cli.repo)?,
            retention: RetentionPolicy {
                tag_filter: TagFilter::new(&cli.tag, &cli.ntag)?,
                deadline: deadline(now, cli.year, cli.month, cli.day)?,
                latest: cli.latest,
            },
            dry_run: cli.dry,
            insecure: cli.insecure,
            timeout: Duration::from_secs(cli.timeout),
            credentials,
            tag_concurrency: cli.concurrency,
            repository_jobs: cli.jobs,
        })
    }
}

/// `now` minus the given years, months and days. Month arithmetic clamps to
/// the last day of the target month.
pub fn deadline(
    now: DateTime<Utc>,
    years: u32,
    months: u32,
    days: u32,
) -> Result<DateTime<Utc>, AppError> {
    let out_of_range = || {
        AppError::Configuration(format!(
            "age of {} years, {} months, {} days is out of range",
            years, months, days
        ))
    };

    let total_months = years
        .checked_mul(12)
        .and_then(|m| m.checked_add(months))
        .ok_or_else(out_of_range)?;

    now.checked_sub_months(Months::new(total_months))
        .and_then(|t| t.checked_sub_days(Days::new(u64::from(days))))
        .ok_or_else(out_of_range)
}
