//! History walker: repository statistics and per-file commit slices.
//!
//! Wraps a [`VersionControl`] backend. Repository verification happens
//! lazily on first use and is remembered for the lifetime of the walker.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};

use crate::classify;
use crate::error::VcsError;
use crate::models::{AuthorStats, CommitRecord, DateRange, RepositoryStats, UNKNOWN_DATE};
use crate::vcs::{LogEntry, VersionControl};

/// Bounds applied while walking history.
#[derive(Debug, Clone)]
pub struct HistoryLimits {
    /// Maximum commits scanned for repository statistics.
    pub stats_commit_cap: usize,
    /// Number of authors kept in [`RepositoryStats::top_authors`].
    pub top_authors: usize,
    /// Maximum bytes of diff text kept per commit.
    pub diff_byte_budget: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            stats_commit_cap: 1000,
            top_authors: 10,
            diff_byte_budget: 2000,
        }
    }
}

pub struct HistoryWalker<'a> {
    vcs: &'a dyn VersionControl,
    limits: HistoryLimits,
    verified: OnceCell<()>,
}

impl<'a> HistoryWalker<'a> {
    pub fn new(vcs: &'a dyn VersionControl, limits: HistoryLimits) -> Self {
        Self {
            vcs,
            limits,
            verified: OnceCell::new(),
        }
    }

    pub fn location(&self) -> String {
        self.vcs.location()
    }

    fn ensure_verified(&self) -> Result<(), VcsError> {
        self.verified.get_or_try_init(|| self.vcs.verify())?;
        Ok(())
    }

    /// Full tracked-file listing. Filtering is the caller's job.
    pub fn tracked_files(&self) -> Result<Vec<String>, VcsError> {
        self.ensure_verified()?;
        self.vcs.list_tracked_files()
    }

    /// Tracked files that pass the lexical classifier, in listing order.
    pub fn source_files(&self) -> Result<Vec<String>, VcsError> {
        Ok(self
            .tracked_files()?
            .into_iter()
            .filter(|p| classify::is_analyzable(p))
            .collect())
    }

    /// Current content of a tracked file.
    pub fn read_file(&self, path: &str) -> Result<String, VcsError> {
        self.ensure_verified()?;
        self.vcs.read_file(path)
    }

    pub fn repository_stats(&self) -> Result<RepositoryStats, VcsError> {
        self.ensure_verified()?;

        let log = self.vcs.log(self.limits.stats_commit_cap, None)?;
        let files = self.source_files()?;

        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for path in &files {
            *languages
                .entry(classify::language_for_path(path).to_string())
                .or_default() += 1;
        }

        let line_stats: HashMap<String, (u64, u64)> = match self
            .vcs
            .line_stats(self.limits.stats_commit_cap)
        {
            Ok(stats) => stats
                .into_iter()
                .map(|s| (s.hash, (s.additions, s.deletions)))
                .collect(),
            Err(e) => {
                tracing::warn!("line statistics unavailable: {}", e);
                HashMap::new()
            }
        };

        let mut authors = aggregate_authors(&log, &line_stats);
        let total_authors = authors.len();
        authors.truncate(self.limits.top_authors);

        let date_range = match (
            log.iter().map(|e| e.timestamp).min(),
            log.iter().map(|e| e.timestamp).max(),
        ) {
            (Some(first), Some(last)) => DateRange {
                first: iso(&first),
                last: iso(&last),
            },
            _ => DateRange {
                first: UNKNOWN_DATE.to_string(),
                last: UNKNOWN_DATE.to_string(),
            },
        };

        Ok(RepositoryStats {
            total_files: files.len(),
            total_commits: log.len(),
            total_authors,
            languages,
            top_authors: authors,
            date_range,
        })
    }

    /// Newest-first commits touching `path`, bounded to `limit`, each with
    /// a truncated single-file diff when one can be produced.
    pub fn file_history(&self, path: &str, limit: usize) -> Result<Vec<CommitRecord>, VcsError> {
        self.ensure_verified()?;

        let entries = self.vcs.log(limit, Some(path))?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let parent = format!("{}^", entry.hash);
            let diff = match self.vcs.diff(&parent, &entry.hash, Some(path)) {
                Ok(text) => Some(truncate_bytes(&text, self.limits.diff_byte_budget)),
                Err(e) => {
                    // Root commits have no parent to diff against.
                    tracing::debug!("no diff for {} at {}: {}", path, entry.hash, e);
                    None
                }
            };
            records.push(CommitRecord {
                hash: entry.hash,
                message: entry.message,
                author: entry.author,
                email: Some(entry.email).filter(|e| !e.is_empty()),
                date: iso(&entry.timestamp),
                diff,
            });
        }
        Ok(records)
    }
}

/// Per-author tallies ordered by commit count, descending. Ties keep the
/// order in which authors first appear in the (newest-first) log.
fn aggregate_authors(log: &[LogEntry], line_stats: &HashMap<String, (u64, u64)>) -> Vec<AuthorStats> {
    struct Tally {
        email: String,
        commits: usize,
        additions: u64,
        deletions: u64,
        first: DateTime<FixedOffset>,
        last: DateTime<FixedOffset>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, Tally> = HashMap::new();

    for entry in log {
        let (add, del) = line_stats.get(&entry.hash).copied().unwrap_or((0, 0));
        match tallies.get_mut(&entry.author) {
            Some(t) => {
                t.commits += 1;
                t.additions += add;
                t.deletions += del;
                t.first = t.first.min(entry.timestamp);
                t.last = t.last.max(entry.timestamp);
            }
            None => {
                order.push(entry.author.clone());
                tallies.insert(
                    entry.author.clone(),
                    Tally {
                        email: entry.email.clone(),
                        commits: 1,
                        additions: add,
                        deletions: del,
                        first: entry.timestamp,
                        last: entry.timestamp,
                    },
                );
            }
        }
    }

    let mut authors: Vec<AuthorStats> = order
        .into_iter()
        .filter_map(|name| {
            let t = tallies.remove(&name)?;
            Some(AuthorStats {
                name,
                email: Some(t.email).filter(|e| !e.is_empty()),
                commits: t.commits,
                additions: t.additions,
                deletions: t.deletions,
                first_commit: iso(&t.first),
                last_commit: iso(&t.last),
            })
        })
        .collect();
    authors.sort_by(|a, b| b.commits.cmp(&a.commits));
    authors
}

pub(crate) fn iso(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Cut `text` to at most `budget` bytes without splitting a character.
pub(crate) fn truncate_bytes(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut end = budget;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
