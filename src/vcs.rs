//! Version-control query service.
//!
//! The pipeline needs only a narrow read-only surface from version control:
//! list tracked files, read commit logs (optionally for one file), fetch a
//! diff between two revisions, and read a file's current content. The
//! [`VersionControl`] trait captures that surface.
//!
//! Two implementations are provided:
//! - **[`GitCli`]** shells out to the `git` binary in a working tree.
//! - **[`MemoryVcs`]** serves a scripted history from memory, for tests and
//!   for callers that already hold history data.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use crate::error::VcsError;

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

/// One entry of a commit log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// Line additions and deletions recorded for one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitLineStats {
    pub hash: String,
    pub additions: u64,
    pub deletions: u64,
}

/// Read-only access to a repository's history.
pub trait VersionControl: Send + Sync {
    /// Human-readable repository identifier used in reports.
    fn location(&self) -> String;

    /// Fail with [`VcsError::NotARepository`] unless the target is a valid
    /// repository.
    fn verify(&self) -> Result<(), VcsError>;

    /// Every tracked path, unfiltered, relative to the repository root.
    fn list_tracked_files(&self) -> Result<Vec<String>, VcsError>;

    /// Newest-first commit log, bounded to `limit`, optionally restricted to
    /// commits touching `file`.
    fn log(&self, limit: usize, file: Option<&str>) -> Result<Vec<LogEntry>, VcsError>;

    /// Unified diff text between two revisions, optionally scoped to `path`.
    fn diff(&self, from: &str, to: &str, path: Option<&str>) -> Result<String, VcsError>;

    /// Current content of a tracked file.
    fn read_file(&self, path: &str) -> Result<String, VcsError>;

    /// Per-commit line tallies for the newest `limit` commits. Backends that
    /// cannot provide them return an empty list.
    fn line_stats(&self, _limit: usize) -> Result<Vec<CommitLineStats>, VcsError> {
        Ok(Vec::new())
    }
}

// ============ git CLI ============

/// [`VersionControl`] backed by the `git` binary.
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VersionControl for GitCli {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn verify(&self) -> Result<(), VcsError> {
        if !self.root.is_dir() {
            return Err(VcsError::NotARepository(self.location()));
        }
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.trim() == "true" => Ok(()),
            _ => Err(VcsError::NotARepository(self.location())),
        }
    }

    fn list_tracked_files(&self) -> Result<Vec<String>, VcsError> {
        let out = self.git(&["ls-files", "-z"])?;
        Ok(out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn log(&self, limit: usize, file: Option<&str>) -> Result<Vec<LogEntry>, VcsError> {
        let max_count = format!("--max-count={}", limit);
        let format = format!("--format=%H{0}%an{0}%ae{0}%aI{0}%s{1}", FIELD_SEP, RECORD_SEP);
        let mut args = vec!["log", max_count.as_str(), format.as_str()];
        if let Some(file) = file {
            args.push("--");
            args.push(file);
        }

        let out = match self.git(&args) {
            Ok(out) => out,
            // A repository without commits has no HEAD to log from.
            Err(VcsError::CommandFailed { stderr, .. })
                if stderr.contains("does not have any commits") =>
            {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e),
        };
        parse_log(&out)
    }

    fn diff(&self, from: &str, to: &str, path: Option<&str>) -> Result<String, VcsError> {
        let mut args = vec!["diff", from, to];
        if let Some(path) = path {
            args.push("--");
            args.push(path);
        }
        self.git(&args)
    }

    fn read_file(&self, path: &str) -> Result<String, VcsError> {
        Ok(std::fs::read_to_string(self.root.join(path))?)
    }

    fn line_stats(&self, limit: usize) -> Result<Vec<CommitLineStats>, VcsError> {
        let max_count = format!("--max-count={}", limit);
        let format = format!("--format={}%H", RECORD_SEP);
        let out = self.git(&["log", max_count.as_str(), format.as_str(), "--numstat"])?;
        Ok(parse_numstat(&out))
    }
}

fn parse_log(out: &str) -> Result<Vec<LogEntry>, VcsError> {
    let mut entries = Vec::new();
    for record in out.split(RECORD_SEP) {
        let record = record.trim_start_matches('\n');
        if record.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
        if fields.len() != 5 {
            return Err(VcsError::Parse(format!("log record: {:?}", record)));
        }
        let timestamp = DateTime::parse_from_rfc3339(fields[3].trim())
            .map_err(|e| VcsError::Parse(format!("commit date {:?}: {}", fields[3], e)))?;
        entries.push(LogEntry {
            hash: fields[0].to_string(),
            author: fields[1].to_string(),
            email: fields[2].to_string(),
            timestamp,
            message: fields[4].trim_end().to_string(),
        });
    }
    Ok(entries)
}

fn parse_numstat(out: &str) -> Vec<CommitLineStats> {
    out.split(RECORD_SEP)
        .filter_map(|record| {
            let mut lines = record.lines();
            let hash = lines.next()?.trim();
            if hash.is_empty() {
                return None;
            }
            let mut stats = CommitLineStats {
                hash: hash.to_string(),
                additions: 0,
                deletions: 0,
            };
            for line in lines {
                let mut cols = line.split('\t');
                // Binary files report "-" and are skipped by the parse.
                if let (Some(add), Some(del)) = (cols.next(), cols.next()) {
                    stats.additions += add.parse::<u64>().unwrap_or(0);
                    stats.deletions += del.parse::<u64>().unwrap_or(0);
                }
            }
            Some(stats)
        })
        .collect()
}

// ============ In-memory ============

/// A change to one file within a [`MemoryCommit`].
#[derive(Debug, Clone)]
pub struct MemoryChange {
    pub path: String,
    pub diff: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone)]
pub struct MemoryCommit {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
    pub changes: Vec<MemoryChange>,
}

/// Scripted, in-memory repository history.
///
/// Commits are added oldest first. The first commit has no parent, so a
/// `<hash>^` diff against it fails the same way it does in git.
#[derive(Debug, Clone, Default)]
pub struct MemoryVcs {
    name: String,
    files: BTreeMap<String, String>,
    commits: Vec<MemoryCommit>,
}

impl MemoryVcs {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add a tracked file with its current content.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Append a commit touching `paths`, authored at `unix_secs`.
    pub fn with_commit(
        mut self,
        hash: &str,
        author: &str,
        email: &str,
        unix_secs: i64,
        message: &str,
        paths: &[&str],
    ) -> Self {
        let timestamp = Utc
            .timestamp_opt(unix_secs, 0)
            .single()
            .unwrap_or_default()
            .fixed_offset();
        self.commits.push(MemoryCommit {
            hash: hash.to_string(),
            message: message.to_string(),
            author: author.to_string(),
            email: email.to_string(),
            timestamp,
            changes: paths
                .iter()
                .map(|p| MemoryChange {
                    path: p.to_string(),
                    diff: format!("--- a/{p}\n+++ b/{p}\n@@ -0,0 +1 @@\n+{message}\n"),
                    additions: 1,
                    deletions: 0,
                })
                .collect(),
        });
        self
    }

    fn entry(commit: &MemoryCommit) -> LogEntry {
        LogEntry {
            hash: commit.hash.clone(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            email: commit.email.clone(),
            timestamp: commit.timestamp,
        }
    }
}

impl VersionControl for MemoryVcs {
    fn location(&self) -> String {
        self.name.clone()
    }

    fn verify(&self) -> Result<(), VcsError> {
        Ok(())
    }

    fn list_tracked_files(&self) -> Result<Vec<String>, VcsError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn log(&self, limit: usize, file: Option<&str>) -> Result<Vec<LogEntry>, VcsError> {
        Ok(self
            .commits
            .iter()
            .rev()
            .filter(|c| file.map_or(true, |f| c.changes.iter().any(|ch| ch.path == f)))
            .take(limit)
            .map(Self::entry)
            .collect())
    }

    fn diff(&self, from: &str, to: &str, path: Option<&str>) -> Result<String, VcsError> {
        let idx = self
            .commits
            .iter()
            .position(|c| c.hash == to)
            .ok_or_else(|| VcsError::CommandFailed {
                command: "diff".to_string(),
                stderr: format!("unknown revision {}", to),
            })?;
        if from == format!("{}^", to) && idx == 0 {
            return Err(VcsError::CommandFailed {
                command: "diff".to_string(),
                stderr: format!("ambiguous argument '{}': unknown revision", from),
            });
        }
        Ok(self.commits[idx]
            .changes
            .iter()
            .filter(|ch| path.map_or(true, |p| ch.path == p))
            .map(|ch| ch.diff.as_str())
            .collect())
    }

    fn read_file(&self, path: &str) -> Result<String, VcsError> {
        self.files.get(path).cloned().ok_or_else(|| {
            VcsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path),
            ))
        })
    }

    fn line_stats(&self, limit: usize) -> Result<Vec<CommitLineStats>, VcsError> {
        Ok(self
            .commits
            .iter()
            .rev()
            .take(limit)
            .map(|c| CommitLineStats {
                hash: c.hash.clone(),
                additions: c.changes.iter().map(|ch| ch.additions).sum(),
                deletions: c.changes.iter().map(|ch| ch.deletions).sum(),
            })
            .collect())
    }
}
