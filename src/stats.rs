//! Repository statistics overview.
//!
//! Prints a quick summary of a repository without running the full
//! excavation: commit and author counts, the language mix, and the most
//! active authors. Used by `dig stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::history::{HistoryLimits, HistoryWalker};
use crate::models::RepositoryStats;
use crate::vcs::VersionControl;

/// Run the stats command: walk history and print a summary to stdout.
pub fn run_stats(vcs: &dyn VersionControl, limits: HistoryLimits) -> Result<()> {
    let walker = HistoryWalker::new(vcs, limits);
    let stats = walker.repository_stats()?;
    print!("{}", render_stats(&walker.location(), &stats, Utc::now()));
    Ok(())
}

/// Render `stats` as the text table printed by `dig stats`.
pub fn render_stats(location: &str, stats: &RepositoryStats, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Repository Stats");
    let _ = writeln!(out, "================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Repository:  {}", location);
    let _ = writeln!(out, "  Files:       {}", stats.total_files);
    let _ = writeln!(out, "  Commits:     {}", stats.total_commits);
    let _ = writeln!(out, "  Authors:     {}", stats.total_authors);
    let _ = writeln!(
        out,
        "  History:     {} .. {}",
        stats.date_range.first, stats.date_range.last
    );

    if !stats.languages.is_empty() {
        let mut languages: Vec<(&String, &usize)> = stats.languages.iter().collect();
        languages.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        let _ = writeln!(out);
        let _ = writeln!(out, "  By language:");
        for (language, count) in languages {
            let _ = writeln!(
                out,
                "  {:<16} {:>6} ({}%)",
                language,
                count,
                percent(*count, stats.total_files)
            );
        }
    }

    if !stats.top_authors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Top authors:");
        let _ = writeln!(
            out,
            "  {:<24} {:>7} {:>9} {:>9}   {}",
            "AUTHOR", "COMMITS", "ADDED", "DELETED", "LAST COMMIT"
        );
        let _ = writeln!(out, "  {}", "-".repeat(76));
        for a in &stats.top_authors {
            let _ = writeln!(
                out,
                "  {:<24} {:>7} {:>9} {:>9}   {}",
                a.name,
                a.commits,
                a.additions,
                a.deletions,
                format_relative(&a.last_commit, now)
            );
        }
    }

    let _ = writeln!(out);
    out
}

fn percent(part: usize, total: usize) -> usize {
    if total > 0 {
        part * 100 / total
    } else {
        0
    }
}

/// Format an RFC 3339 timestamp relative to `now` (e.g. "3 days ago").
/// Unparseable input is returned as-is.
fn format_relative(ts: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(ts) else {
        return ts.to_string();
    };
    let delta = now.timestamp() - then.timestamp();

    if delta < 0 {
        return format_date(then.with_timezone(&Utc));
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_date(then.with_timezone(&Utc))
    }
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorStats, DateRange};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_relative() {
        assert_eq!(format_relative("2024-03-10T11:59:30Z", now()), "just now");
        assert_eq!(format_relative("2024-03-10T11:00:00Z", now()), "1 hour ago");
        assert_eq!(format_relative("2024-03-07T12:00:00Z", now()), "3 days ago");
        assert_eq!(format_relative("2023-01-01T08:30:00Z", now()), "2023-01-01 08:30");
        assert_eq!(format_relative("unknown", now()), "unknown");
    }

    #[test]
    fn test_render_stats_table() {
        let stats = RepositoryStats {
            total_files: 4,
            total_commits: 7,
            total_authors: 2,
            languages: [("typescript".to_string(), 3), ("python".to_string(), 1)]
                .into_iter()
                .collect(),
            top_authors: vec![AuthorStats {
                name: "Ada".into(),
                email: Some("ada@example.com".into()),
                commits: 5,
                additions: 120,
                deletions: 30,
                first_commit: "2024-01-01T00:00:00Z".into(),
                last_commit: "2024-03-09T12:00:00Z".into(),
            }],
            date_range: DateRange {
                first: "2024-01-01T00:00:00Z".into(),
                last: "2024-03-09T12:00:00Z".into(),
            },
        };
        let text = render_stats("fixture", &stats, now());
        assert!(text.contains("Repository:  fixture"));
        assert!(text.contains("Commits:     7"));
        // Most common language first.
        let ts = text.find("typescript").unwrap();
        let py = text.find("python").unwrap();
        assert!(ts < py);
        assert!(text.contains("75%"));
        assert!(text.contains("1 day ago"));
    }

    #[test]
    fn test_render_empty_repository() {
        let text = render_stats("empty", &RepositoryStats::default(), now());
        assert!(text.contains("Files:       0"));
        assert!(!text.contains("Top authors"));
    }
}
