use std::collections::HashSet;

use colored::Colorize;

use crate::executor::TagOutcome;
use crate::models::Image;
use crate::pipeline::{RepoReport, RepoStatus};
use crate::retention::Classification;

/// Print the decision report for a repository
pub fn print_report(report: &RepoReport, dry_run: bool) {
    let header = if dry_run {
        format!(" {} ", "DRY RUN".yellow().bold())
    } else {
        String::new()
    };

    let (classified, decisions) = match &report.status {
        RepoStatus::Filtered => return,
        RepoStatus::FetchFailed(reason) => {
            println!(
                "\n{}Repository: {} {}",
                header,
                report.repository.bold(),
                "SKIPPED".red().bold()
            );
            println!("  {}", reason.red());
            return;
        }
        RepoStatus::NoMatchingTags => {
            println!(
                "\n{}Repository: {} {}",
                header,
                report.repository.bold(),
                "(no matching tags)".dimmed()
            );
            return;
        }
        RepoStatus::Evaluated {
            classified,
            decisions,
        } => (classified, decisions),
    };

    println!(
        "\n{}Repository: {}{}",
        header,
        report.repository.bold(),
        if dry_run { " (no changes will be made)" } else { "" }
    );
    println!("{}", "─".repeat(60));

    for c in classified.iter().rev() {
        let label = match c.class {
            Classification::Ignored => "IGNORE".dimmed().to_string(),
            Classification::RetainedRecency | Classification::RetainedNotExpired => {
                "  KEEP".green().bold().to_string()
            }
            Classification::DeletionCandidate => continue,
        };
        print_tag_line(&c.image, &label, &c.class.to_string());
    }

    for d in decisions {
        let label = match &d.outcome {
            TagOutcome::Deleted => "DELETE".red().bold().to_string(),
            TagOutcome::WouldDelete => "DELETE".yellow().bold().to_string(),
            TagOutcome::SkippedProtected { .. } => "  KEEP".cyan().bold().to_string(),
            TagOutcome::SkippedAlreadyProcessed => "  SKIP".dimmed().to_string(),
            TagOutcome::Failed(_) => "FAILED".red().bold().to_string(),
        };
        print_tag_line(&d.image, &label, &d.outcome.to_string());
    }

    if decisions.is_empty() {
        println!("  {}", "Nothing to delete.".green());
    }
}

fn print_tag_line(image: &Image, label: &str, reason: &str) {
    println!(
        "    [{}] {:<30} {} {} {}",
        label,
        image.tag,
        truncate_digest(&image.digest).dimmed(),
        image
            .created_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed(),
        reason.dimmed(),
    );
}

fn truncate_digest(digest: &str) -> &str {
    digest.get(..19).unwrap_or(digest)
}

/// Totals over all repository reports of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: usize,
    pub filtered: usize,
    pub skipped: usize,
    pub kept: usize,
    pub deleted: usize,
    pub unique_digests: usize,
    pub protected: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[RepoReport]) -> Self {
        let mut summary = RunSummary::default();
        let mut digests: HashSet<(&str, &str)> = HashSet::new();

        for report in reports {
            let (classified, decisions) = match &report.status {
                RepoStatus::Filtered => {
                    summary.filtered += 1;
                    continue;
                }
                RepoStatus::FetchFailed(_) => {
                    summary.skipped += 1;
                    continue;
                }
                RepoStatus::NoMatchingTags => {
                    summary.evaluated += 1;
                    continue;
                }
                RepoStatus::Evaluated {
                    classified,
                    decisions,
                } => (classified, decisions),
            };

            summary.evaluated += 1;
            summary.kept += classified
                .iter()
                .filter(|c| {
                    matches!(
                        c.class,
                        Classification::RetainedRecency | Classification::RetainedNotExpired
                    )
                })
                .count();

            for d in decisions {
                match &d.outcome {
                    TagOutcome::Deleted | TagOutcome::WouldDelete => {
                        summary.deleted += 1;
                        digests.insert((d.image.repository.as_str(), d.image.digest.as_str()));
                    }
                    TagOutcome::SkippedAlreadyProcessed => {
                        let key = (d.image.repository.as_str(), d.image.digest.as_str());
                        if digests.contains(&key) {
                            summary.deleted += 1;
                        }
                    }
                    TagOutcome::SkippedProtected { .. } => summary.protected += 1,
                    TagOutcome::Failed(_) => summary.failed += 1,
                }
            }
        }

        summary.unique_digests = digests.len();
        summary
    }
}

/// Print final summary
pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!("\n{}", "═".repeat(60));
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().bold().to_string()
    } else {
        summary.failed.to_string()
    };
    let skipped = if summary.skipped > 0 {
        summary.skipped.to_string().red().bold().to_string()
    } else {
        summary.skipped.to_string()
    };

    println!(
        "{} {} repositories evaluated, {} skipped on fetch errors, {} filtered out",
        if dry_run {
            "DRY RUN SUMMARY:".yellow().bold()
        } else {
            "SUMMARY:".bold()
        },
        summary.evaluated,
        skipped,
        summary.filtered,
    );
    println!(
        "  {} {} tags ({} unique digests), kept {} tags, \
         {} protected by shared digests, {} failed deletions",
        if dry_run { "Would delete" } else { "Deleted" },
        summary.deleted.to_string().red().bold(),
        summary.unique_digests,
        summary.kept.to_string().green().bold(),
        summary.protected,
        failed,
    );

    if !dry_run && summary.deleted > 0 {
        println!(
            "\n{} Run registry garbage collection to reclaim disk space:",
            "REMINDER:".yellow().bold()
        );
        println!(
            "  docker exec <registry-container> \
             bin/registry garbage-collect /etc/docker/registry/config.yml"
        );
    }
}
