//! Excavation progress reporting.
//!
//! A run reports a monotonically increasing percentage plus a short label
//! for the current step, at phase boundaries and once per analyzed file.
//! Reporters write to **stderr** so stdout stays parseable when the report
//! is printed there.

use std::io::Write;

use crate::excavate::Phase;

/// Receives progress updates from a running excavation.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: u8, step: &str);

    /// Called on each phase transition, before the phase's first report.
    fn phase(&self, _phase: Phase) {}
}

/// Any `Fn(u8, &str)` closure is a reporter.
impl<F> ProgressReporter for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn report(&self, percent: u8, step: &str) {
        self(percent, step)
    }
}

/// Human-friendly progress on stderr: "[ 42%] analyzing src/app.ts (3/10)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, percent: u8, step: &str) {
        let line = format!("[{:>3}%] {}\n", percent, step);
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, percent: u8, step: &str) {
        let obj = serde_json::json!({
            "event": "progress",
            "percent": percent,
            "step": step,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _percent: u8, _step: &str) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Percentage for file `index` (0-based) of `total` inside the analysis
/// band `[start, end)`.
pub fn analysis_percent(index: usize, total: usize, start: u8, end: u8) -> u8 {
    if total == 0 {
        return start;
    }
    let span = (end - start) as usize;
    start + (span * index / total) as u8
}
