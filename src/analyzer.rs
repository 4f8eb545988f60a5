//! File analyzer: one [`FileVerdict`] per selected file.
//!
//! Composes the lexical classifier, the metric extractor, the history
//! walker, and (optionally) the synthesis service. Every failure here is
//! local to the file: unreadable content skips the file, a history or
//! synthesis failure degrades the verdict.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classify;
use crate::history::HistoryWalker;
use crate::metrics;
use crate::models::{FileVerdict, UNKNOWN_DATE};
use crate::rate_limit::MinIntervalGate;
use crate::synthesis::{SynthesisRequest, Synthesizer};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Commits fetched per file.
    pub max_commits: usize,
    /// Characters of source sent to the synthesis service.
    pub excerpt_chars: usize,
    /// Most recent commits sent to the synthesis service.
    pub synthesis_commits: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_commits: 10,
            excerpt_chars: 4000,
            synthesis_commits: 5,
        }
    }
}

pub struct FileAnalyzer<'a> {
    walker: &'a HistoryWalker<'a>,
    synthesizer: Option<&'a dyn Synthesizer>,
    gate: Option<&'a MinIntervalGate>,
    options: AnalyzeOptions,
    attempted: AtomicUsize,
    failed: AtomicUsize,
}

impl<'a> FileAnalyzer<'a> {
    /// `synthesizer = None` runs without narrative analysis.
    pub fn new(
        walker: &'a HistoryWalker<'a>,
        synthesizer: Option<&'a dyn Synthesizer>,
        options: AnalyzeOptions,
    ) -> Self {
        Self {
            walker,
            synthesizer,
            gate: None,
            options,
            attempted: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Space synthesis calls through `gate`. Files that never reach the
    /// synthesizer do not wait.
    pub fn with_gate(mut self, gate: &'a MinIntervalGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Synthesis calls made so far, and how many of them failed.
    pub fn synthesis_tally(&self) -> (usize, usize) {
        (
            self.attempted.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }

    /// Analyze one file. Returns `None` when its content cannot be read.
    pub async fn analyze(&self, path: &str) -> Option<FileVerdict> {
        let code = match self.walker.read_file(path) {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path, e);
                return None;
            }
        };

        let language = classify::language_for_path(path).to_string();
        let metrics = metrics::extract(&code, &language);

        let commits = match self.walker.file_history(path, self.options.max_commits) {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!("no history for {}: {}", path, e);
                Vec::new()
            }
        };

        let analysis = match self.synthesizer {
            Some(synthesizer) if !commits.is_empty() => {
                let recent = &commits[..commits.len().min(self.options.synthesis_commits)];
                let request = SynthesisRequest {
                    code: excerpt(&code, self.options.excerpt_chars),
                    language: &language,
                    file_path: path,
                    commits: recent,
                };
                if let Some(gate) = self.gate {
                    gate.wait().await;
                }
                self.attempted.fetch_add(1, Ordering::Relaxed);
                match synthesizer.analyze(&request).await {
                    Ok(verdict) => Some(verdict),
                    Err(e) => {
                        self.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("synthesis failed for {}: {}", path, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let authors = commits.iter().map(|c| c.author.clone()).collect();
        let last_modified = commits
            .first()
            .map(|c| c.date.clone())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let created_at = commits
            .last()
            .map(|c| c.date.clone())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        Some(FileVerdict {
            path: path.to_string(),
            language,
            metrics,
            commits,
            authors,
            analysis,
            last_modified,
            created_at,
        })
    }
}

/// The first `max_chars` characters of `code`.
fn excerpt(code: &str, max_chars: usize) -> &str {
    match code.char_indices().nth(max_chars) {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthesisError;
    use crate::history::HistoryLimits;
    use crate::models::NarrativeVerdict;
    use crate::vcs::MemoryVcs;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<(usize, usize)>>,
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for Recording {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn analyze(
            &self,
            request: &SynthesisRequest<'_>,
        ) -> Result<NarrativeVerdict, SynthesisError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.code.chars().count(), request.commits.len()));
            if self.fail {
                return Err(SynthesisError::EmptyResponse);
            }
            Ok(NarrativeVerdict {
                summary: "ok".into(),
                confidence_score: 0.9,
                ..NarrativeVerdict::default()
            })
        }
    }

    fn vcs() -> MemoryVcs {
        let mut vcs = MemoryVcs::new("fixture")
            .with_file("src/big.ts", &"x".repeat(10_000))
            .with_file("src/new.ts", "export const a = 1;");
        for i in 0..8 {
            vcs = vcs.with_commit(
                &format!("c{i}"),
                if i % 2 == 0 { "Ada" } else { "Bob" },
                "dev@example.com",
                1_700_000_000 + i * 1000,
                &format!("change {i}"),
                &["src/big.ts"],
            );
        }
        vcs
    }

    #[tokio::test]
    async fn test_verdict_without_synthesis() {
        let vcs = vcs();
        let walker = HistoryWalker::new(&vcs, HistoryLimits::default());
        let analyzer = FileAnalyzer::new(&walker, None, AnalyzeOptions::default());

        let v = analyzer.analyze("src/big.ts").await.unwrap();
        assert_eq!(v.language, "typescript");
        assert_eq!(v.commits.len(), 8);
        assert_eq!(v.commits[0].hash, "c7");
        assert_eq!(v.authors.len(), 2);
        assert!(v.analysis.is_none());
        assert!(v.last_modified > v.created_at);
        assert_eq!(analyzer.synthesis_tally(), (0, 0));
    }

    #[tokio::test]
    async fn test_file_without_history_has_unknown_dates() {
        let vcs = vcs();
        let walker = HistoryWalker::new(&vcs, HistoryLimits::default());
        let synth = Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        };
        let analyzer = FileAnalyzer::new(&walker, Some(&synth), AnalyzeOptions::default());

        let v = analyzer.analyze("src/new.ts").await.unwrap();
        assert!(v.commits.is_empty());
        assert_eq!(v.last_modified, UNKNOWN_DATE);
        assert_eq!(v.created_at, UNKNOWN_DATE);
        // No commits, so no synthesis call.
        assert!(v.analysis.is_none());
        assert!(synth.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let vcs = vcs();
        let walker = HistoryWalker::new(&vcs, HistoryLimits::default());
        let analyzer = FileAnalyzer::new(&walker, None, AnalyzeOptions::default());
        assert!(analyzer.analyze("src/missing.ts").await.is_none());
    }

    #[tokio::test]
    async fn test_synthesis_receives_bounded_excerpt_and_commits() {
        let vcs = vcs();
        let walker = HistoryWalker::new(&vcs, HistoryLimits::default());
        let synth = Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        };
        let analyzer = FileAnalyzer::new(&walker, Some(&synth), AnalyzeOptions::default());

        let v = analyzer.analyze("src/big.ts").await.unwrap();
        assert_eq!(v.analysis.unwrap().summary, "ok");
        assert_eq!(*synth.seen.lock().unwrap(), vec![(4000, 5)]);
        assert_eq!(analyzer.synthesis_tally(), (1, 0));
    }

    #[tokio::test]
    async fn test_synthesis_failure_degrades_verdict() {
        let vcs = vcs();
        let walker = HistoryWalker::new(&vcs, HistoryLimits::default());
        let synth = Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        };
        let analyzer = FileAnalyzer::new(&walker, Some(&synth), AnalyzeOptions::default());

        let v = analyzer.analyze("src/big.ts").await.unwrap();
        assert!(v.analysis.is_none());
        assert_eq!(v.metrics.lines, 1);
        assert_eq!(analyzer.synthesis_tally(), (1, 1));
    }

    #[test]
    fn test_excerpt_counts_characters() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("", 3), "");
    }
}
