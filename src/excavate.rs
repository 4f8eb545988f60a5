//! Excavation orchestration.
//!
//! Sequences one run over a repository:
//!
//! ```text
//! pending → statistics → discovery → selection → analysis → graph → insights → complete
//!                                                                              ↘ failed
//! ```
//!
//! Phases run strictly in order because each consumes the previous one's
//! output. Files are analyzed one at a time; each synthesis call waits on a
//! [`MinIntervalGate`] so the external service sees at most one request per
//! interval. Files that make no synthesis call, and runs with synthesis
//! disabled, never wait.
//!
//! Failures follow three tiers:
//! - fatal (invalid repository, tracked files cannot be listed) → `Err`
//! - per file (unreadable, synthesis or diff failure) → degraded verdict
//! - per phase (synthesis unavailable at startup) → run without synthesis

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analyzer::{AnalyzeOptions, FileAnalyzer};
use crate::classify;
use crate::config::ExcavationConfig;
use crate::error::{ExcavationError, SynthesisError};
use crate::graph::build_graph;
use crate::history::{HistoryLimits, HistoryWalker};
use crate::insights::synthesize;
use crate::models::ExcavationReport;
use crate::progress::{analysis_percent, ProgressReporter};
use crate::rate_limit::MinIntervalGate;
use crate::synthesis::{DisabledSynthesizer, Synthesizer};
use crate::vcs::VersionControl;

/// Reported as `modelUsed` when synthesis was skipped on request.
pub const MODEL_NONE: &str = "none";
/// Reported as `modelUsed` when the synthesizer could not be initialized.
pub const MODEL_UNAVAILABLE: &str = "unavailable";

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Statistics,
    Discovery,
    Selection,
    Analysis,
    Graph,
    Insights,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

/// Cooperative cancellation, checked before each file.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ExcavationOptions {
    pub max_files: usize,
    pub max_commits_per_file: usize,
    /// Bypass the synthesis service entirely.
    pub skip_analysis: bool,
    /// Explicit file selection replacing discovery order. Paths that are
    /// not discovered source files are dropped.
    pub selection: Option<Vec<String>>,
    pub request_interval: Duration,
    pub excerpt_chars: usize,
    pub synthesis_commits: usize,
    pub history: HistoryLimits,
}

impl Default for ExcavationOptions {
    fn default() -> Self {
        Self::from_config(&ExcavationConfig::default())
    }
}

impl ExcavationOptions {
    pub fn from_config(config: &ExcavationConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_commits_per_file: config.max_commits_per_file,
            skip_analysis: false,
            selection: None,
            request_interval: Duration::from_millis(config.request_interval_ms),
            excerpt_chars: config.excerpt_chars,
            synthesis_commits: config.synthesis_commits,
            history: config.history_limits(),
        }
    }
}

/// The synthesis collaborator as handed to a run.
pub enum SynthesisSetup<'a> {
    /// Synthesis not wanted.
    Skipped,
    /// Initialization failed; the run continues without synthesis.
    Unavailable(SynthesisError),
    Ready(&'a dyn Synthesizer),
}

impl<'a> SynthesisSetup<'a> {
    /// Wrap the outcome of building a synthesizer. The disabled provider
    /// counts as a deliberate skip, every other error as unavailable.
    pub fn from_result(result: &'a Result<Box<dyn Synthesizer>, SynthesisError>) -> Self {
        match result {
            Ok(s) if s.model_name() == DisabledSynthesizer::MODEL_NAME => SynthesisSetup::Skipped,
            Ok(s) => SynthesisSetup::Ready(s.as_ref()),
            Err(SynthesisError::Disabled) => SynthesisSetup::Skipped,
            Err(e) => SynthesisSetup::Unavailable(SynthesisError::Config(e.to_string())),
        }
    }
}

/// One excavation over one repository. Runs share no mutable state.
pub struct Excavation<'a> {
    vcs: &'a dyn VersionControl,
    synthesis: SynthesisSetup<'a>,
    options: ExcavationOptions,
    cancel: CancelFlag,
}

impl<'a> Excavation<'a> {
    pub fn new(vcs: &'a dyn VersionControl, options: ExcavationOptions) -> Self {
        Self {
            vcs,
            synthesis: SynthesisSetup::Skipped,
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisSetup<'a>) -> Self {
        self.synthesis = synthesis;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        progress: &dyn ProgressReporter,
    ) -> Result<ExcavationReport, ExcavationError> {
        let started = Instant::now();
        let walker = HistoryWalker::new(self.vcs, self.options.history.clone());

        progress.phase(Phase::Statistics);
        progress.report(5, "collecting repository statistics");
        let stats = walker.repository_stats()?;
        tracing::info!(
            "{}: {} commits, {} authors, {} source files",
            walker.location(),
            stats.total_commits,
            stats.total_authors,
            stats.total_files
        );

        progress.phase(Phase::Discovery);
        progress.report(15, "discovering source files");
        let discovered = walker.source_files()?;

        progress.phase(Phase::Selection);
        progress.report(20, "selecting files");
        let selected = select_files(
            &discovered,
            self.options.selection.as_deref(),
            self.options.max_files,
        );
        tracing::info!(
            "selected {} of {} source files",
            selected.len(),
            discovered.len()
        );

        let synthesizer = match &self.synthesis {
            SynthesisSetup::Ready(s) if !self.options.skip_analysis => Some(*s),
            SynthesisSetup::Unavailable(e) if !self.options.skip_analysis => {
                tracing::warn!("synthesis unavailable, continuing without it: {}", e);
                None
            }
            _ => None,
        };
        let gate = MinIntervalGate::new(self.options.request_interval);
        if synthesizer.is_some() {
            tracing::debug!("synthesis calls spaced {:?} apart", gate.interval());
        }
        let analyzer = FileAnalyzer::new(
            &walker,
            synthesizer,
            AnalyzeOptions {
                max_commits: self.options.max_commits_per_file,
                excerpt_chars: self.options.excerpt_chars,
                synthesis_commits: self.options.synthesis_commits,
            },
        )
        .with_gate(&gate);

        progress.phase(Phase::Analysis);
        let mut verdicts = Vec::with_capacity(selected.len());
        for (i, path) in selected.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("cancelled before {}", path);
                return Err(ExcavationError::Cancelled {
                    analyzed: i,
                    selected: selected.len(),
                });
            }
            progress.report(
                analysis_percent(i, selected.len(), 25, 85),
                &format!("analyzing {} ({}/{})", path, i + 1, selected.len()),
            );
            if let Some(verdict) = analyzer.analyze(path).await {
                verdicts.push(verdict);
            }
        }

        progress.phase(Phase::Graph);
        progress.report(90, "building knowledge graph");
        let graph = build_graph(&verdicts, &stats);

        progress.phase(Phase::Insights);
        progress.report(95, "synthesizing insights");
        let insights = synthesize(&verdicts, &stats);

        let model_used = self.model_used(analyzer.synthesis_tally());
        let report = ExcavationReport {
            id: uuid::Uuid::new_v4().to_string(),
            repository: walker.location(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms: started.elapsed().as_millis() as u64,
            model_used,
            stats,
            files: verdicts,
            graph,
            insights,
        };

        progress.phase(Phase::Complete);
        progress.report(100, "complete");
        tracing::info!(
            "excavation of {} finished in {} ms",
            report.repository,
            report.duration_ms
        );
        Ok(report)
    }

    fn model_used(&self, (attempted, failed): (usize, usize)) -> String {
        if self.options.skip_analysis {
            return MODEL_NONE.to_string();
        }
        match &self.synthesis {
            SynthesisSetup::Skipped => MODEL_NONE.to_string(),
            SynthesisSetup::Unavailable(_) => MODEL_UNAVAILABLE.to_string(),
            SynthesisSetup::Ready(s) if attempted > 0 && attempted == failed => {
                format!("{} (failed)", s.model_name())
            }
            SynthesisSetup::Ready(s) => s.model_name().to_string(),
        }
    }
}

/// Apply the selection override (if any) and the file cap.
///
/// Without an override, discovery order is kept. With one, its order wins
/// and entries that are not discovered source files are dropped.
pub fn select_files(discovered: &[String], selection: Option<&[String]>, max_files: usize) -> Vec<String> {
    match selection {
        None => discovered.iter().take(max_files).cloned().collect(),
        Some(chosen) => {
            let known: HashSet<&str> = discovered.iter().map(String::as_str).collect();
            let mut seen = HashSet::new();
            chosen
                .iter()
                .filter(|p| known.contains(p.as_str()) && classify::is_analyzable(p))
                .filter(|p| seen.insert(p.as_str()))
                .take(max_files)
                .cloned()
                .collect()
        }
    }
}
