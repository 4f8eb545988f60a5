//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration. CLI flags override individual values.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::history::HistoryLimits;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub excavation: ExcavationConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExcavationConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_commits_per_file")]
    pub max_commits_per_file: usize,
    #[serde(default = "default_stats_commit_cap")]
    pub stats_commit_cap: usize,
    #[serde(default = "default_top_authors")]
    pub top_authors: usize,
    #[serde(default = "default_diff_byte_budget")]
    pub diff_byte_budget: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_synthesis_commits")]
    pub synthesis_commits: usize,
    /// Minimum spacing between synthesis calls.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
}

impl Default for ExcavationConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_commits_per_file: default_max_commits_per_file(),
            stats_commit_cap: default_stats_commit_cap(),
            top_authors: default_top_authors(),
            diff_byte_budget: default_diff_byte_budget(),
            excerpt_chars: default_excerpt_chars(),
            synthesis_commits: default_synthesis_commits(),
            request_interval_ms: default_request_interval_ms(),
        }
    }
}

impl ExcavationConfig {
    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            stats_commit_cap: self.stats_commit_cap,
            top_authors: self.top_authors,
            diff_byte_budget: self.diff_byte_budget,
        }
    }
}

fn default_max_files() -> usize {
    50
}
fn default_max_commits_per_file() -> usize {
    10
}
fn default_stats_commit_cap() -> usize {
    1000
}
fn default_top_authors() -> usize {
    10
}
fn default_diff_byte_budget() -> usize {
    2000
}
fn default_excerpt_chars() -> usize {
    4000
}
fn default_synthesis_commits() -> usize {
    5
}
fn default_request_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// `disabled` or `gemini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Fixed model name. When unset the provider discovers one.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SynthesisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let ex = &config.excavation;
    if ex.max_files == 0 {
        bail!("excavation.max_files must be >= 1");
    }
    if ex.max_commits_per_file == 0 {
        bail!("excavation.max_commits_per_file must be >= 1");
    }
    if ex.excerpt_chars == 0 {
        bail!("excavation.excerpt_chars must be > 0");
    }

    match config.synthesis.provider.as_str() {
        "disabled" | "gemini" => {}
        other => bail!(
            "Unknown synthesis provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.synthesis.max_retries == 0 {
        bail!("synthesis.max_retries must be >= 1");
    }
    if config.synthesis.timeout_secs == 0 {
        bail!("synthesis.timeout_secs must be > 0");
    }
    Ok(())
}
