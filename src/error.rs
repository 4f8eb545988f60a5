//! Typed errors raised by the excavation pipeline.
//!
//! Lower-level components return these; the file analyzer and the
//! orchestrator decide which ones degrade a single verdict and which ones
//! end the run.

use thiserror::Error;

/// Failure talking to the version-control query service.
#[derive(Error, Debug)]
pub enum VcsError {
    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected git output: {0}")]
    Parse(String),
}

/// Failure talking to the narrative-synthesis service.
///
/// Always recoverable for a single file; the analyzer records the verdict
/// without an analysis and moves on.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("synthesis provider is disabled")]
    Disabled,

    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("synthesis API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesis service returned an empty response")]
    EmptyResponse,

    #[error("synthesis response is not valid JSON: {0}")]
    Malformed(String),

    #[error("synthesis failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("no model supporting content generation is available")]
    NoModel,

    #[error("{0}")]
    Config(String),
}

/// Fatal failure of a whole excavation run.
#[derive(Error, Debug)]
pub enum ExcavationError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("excavation cancelled after {analyzed} of {selected} files")]
    Cancelled { analyzed: usize, selected: usize },
}
