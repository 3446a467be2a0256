use clap::{Parser, ValueEnum};

/// regsweep — Docker Registry retention cleaner
#[derive(Parser, Debug)]
#[command(name = "regsweep", version, about, arg_required_else_help = true)]
pub struct Cli {
    /// Registry URL (e.g., http://localhost:5000)
    #[arg(long, env = "REGSWEEP_REGISTRY", default_value = "http://localhost:5000")]
    pub registry: String,

    /// Maximum number of repositories to fetch from the registry
    #[arg(long = "repos", visible_alias = "max-repositories", default_value_t = 5)]
    pub max_repositories: usize,

    /// Matching repositories (regex)
    #[arg(long, default_value = ".*", allow_hyphen_values = true)]
    pub repo: String,

    /// Matching tags (regex)
    #[arg(long, default_value = ".*", allow_hyphen_values = true)]
    pub tag: String,

    /// Non-matching tags (regex, empty disables)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub ntag: String,

    /// Max age in days
    #[arg(long, default_value_t = 0)]
    pub day: u32,

    /// Max age in months
    #[arg(long, default_value_t = 0)]
    pub month: u32,

    /// Max age in years
    #[arg(long, default_value_t = 0)]
    pub year: u32,

    /// Number of the latest matching tags of a repository that won't be deleted
    #[arg(long, default_value_t = 1)]
    pub latest: usize,

    /// Preview decisions without deleting
    #[arg(long, visible_alias = "dry-run", default_value_t = false)]
    pub dry: bool,

    /// Skip TLS certificate verification
    #[arg(long, default_value_t = false)]
    pub insecure: bool,

    /// Username for registry authentication
    #[arg(long, env = "REGSWEEP_USER")]
    pub user: Option<String>,

    /// Password for registry authentication (prompted when --user is set without it)
    #[arg(long, env = "REGSWEEP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Tag lookups in flight per repository
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Repositories processed in parallel
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Log format written to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["regsweep", "--dry"]);
        assert_eq!(cli.registry, "http://localhost:5000");
        assert_eq!(cli.max_repositories, 5);
        assert_eq!(cli.repo, ".*");
        assert_eq!(cli.tag, ".*");
        assert_eq!(cli.ntag, "");
        assert_eq!(cli.latest, 1);
        assert!(cli.dry);
        assert_eq!(cli.timeout, 60);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_patterns_may_start_with_hyphen() {
        let cli = Cli::try_parse_from([
            "regsweep", "--ntag", "-rc", "--tag", "-x", "--repo", "-dev$",
        ])
        .unwrap();
        assert_eq!(cli.ntag, "-rc");
        assert_eq!(cli.tag, "-x");
        assert_eq!(cli.repo, "-dev$");
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::parse_from([
            "regsweep",
            "--max-repositories",
            "50",
            "--dry-run",
            "--month",
            "2",
        ]);
        assert_eq!(cli.max_repositories, 50);
        assert!(cli.dry);
        assert_eq!(cli.month, 2);
    }

    #[test]
    fn test_negative_age_rejected() {
        assert!(Cli::try_parse_from(["regsweep", "--day", "-3"]).is_err());
    }
}
