//! # Excavator CLI (`dig`)
//!
//! The `dig` binary runs repository excavations and the smaller inspection
//! commands built on the same pipeline.
//!
//! ## Usage
//!
//! ```bash
//! dig --config ./config/dig.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dig excavate <repo>` | Full run: stats, metrics, history, synthesis, graph, insights |
//! | `dig stats <repo>` | Repository statistics only |
//! | `dig files <repo>` | Source files an excavation would consider |
//! | `dig classify <path>...` | Language and source/ignored classification |
//! | `dig models` | Models offered by the configured synthesis provider |
//!
//! ## Examples
//!
//! ```bash
//! # Metrics, history and graph without calling the model
//! dig excavate ./repo --skip-analysis --output report.json
//!
//! # Analyze two specific files
//! dig excavate ./repo --select src/auth.ts --select src/billing.ts
//!
//! # Machine-readable progress on stderr, report on stdout
//! dig excavate ./repo --progress json > report.json
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use excavator::classify;
use excavator::config::{self, Config};
use excavator::excavate::{Excavation, ExcavationOptions, Phase, SynthesisSetup};
use excavator::export;
use excavator::history::HistoryWalker;
use excavator::jobs::{run_job, InMemoryJobStore};
use excavator::progress::ProgressMode;
use excavator::stats;
use excavator::synthesis::{create_synthesizer, GeminiSynthesizer};
use excavator::vcs::GitCli;

/// Excavator CLI: repository archaeology reports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "dig",
    about = "Excavator: repository archaeology reports from git history",
    version,
    long_about = "Excavator walks a git repository's history and current files, computes \
    per-file metrics, optionally asks a language model for a narrative verdict on each file, \
    and assembles a knowledge graph and insight report as JSON."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dig.toml`. Excavation limits and synthesis
    /// provider settings are read from this file.
    #[arg(long, global = true, default_value = "./config/dig.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a full excavation and emit the report as JSON.
    ///
    /// Collects repository statistics, selects source files, computes
    /// metrics and history per file, optionally synthesizes a narrative
    /// verdict per file, then builds the knowledge graph and insights.
    Excavate {
        /// Path to the git repository.
        repo: PathBuf,

        /// Maximum number of files to analyze.
        #[arg(long)]
        max_files: Option<usize>,

        /// Maximum commits fetched per file.
        #[arg(long)]
        max_commits: Option<usize>,

        /// Skip narrative synthesis; metrics, history and graph only.
        #[arg(long)]
        skip_analysis: bool,

        /// Analyze these paths (repository-relative) instead of the
        /// discovery order. Repeatable.
        #[arg(long = "select")]
        select: Vec<String>,

        /// Write the report to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print repository statistics.
    Stats {
        /// Path to the git repository.
        repo: PathBuf,
    },

    /// List source files an excavation would consider, in discovery order.
    Files {
        /// Path to the git repository.
        repo: PathBuf,
    },

    /// Classify paths by language and source/ignored status.
    Classify {
        /// Paths to classify. They do not need to exist.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List models offered by the configured synthesis provider.
    Models,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Classify { paths } = &cli.command {
        run_classify(paths);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Excavate {
            repo,
            max_files,
            max_commits,
            skip_analysis,
            select,
            output,
            progress,
        } => {
            let mut options = ExcavationOptions::from_config(&cfg.excavation);
            if let Some(n) = max_files {
                if n == 0 {
                    bail!("--max-files must be >= 1");
                }
                options.max_files = n;
            }
            if let Some(n) = max_commits {
                if n == 0 {
                    bail!("--max-commits must be >= 1");
                }
                options.max_commits_per_file = n;
            }
            options.skip_analysis = skip_analysis;
            if !select.is_empty() {
                options.selection = Some(select);
            }
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            run_excavate(&cfg, &repo, options, progress, output).await?;
        }
        Commands::Stats { repo } => {
            let vcs = GitCli::new(&repo);
            stats::run_stats(&vcs, cfg.excavation.history_limits())?;
        }
        Commands::Files { repo } => {
            let vcs = GitCli::new(&repo);
            let walker = HistoryWalker::new(&vcs, cfg.excavation.history_limits());
            let files = walker.source_files()?;
            for path in &files {
                println!("{:<12} {}", classify::language_for_path(path), path);
            }
            eprintln!("{} source files", files.len());
        }
        Commands::Models => {
            run_models(&cfg).await?;
        }
        Commands::Classify { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

async fn run_excavate(
    cfg: &Config,
    repo: &std::path::Path,
    options: ExcavationOptions,
    progress: ProgressMode,
    output: Option<PathBuf>,
) -> Result<()> {
    let vcs = GitCli::new(repo);

    let synthesizer = if options.skip_analysis {
        None
    } else {
        Some(create_synthesizer(&cfg.synthesis).await)
    };
    let setup = match &synthesizer {
        None => SynthesisSetup::Skipped,
        Some(result) => SynthesisSetup::from_result(result),
    };

    let excavation = Excavation::new(&vcs, options).with_synthesis(setup);
    let cancel = excavation.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current file...");
            cancel.cancel();
        }
    });

    let store = InMemoryJobStore::new();
    let reporter = progress.reporter();
    let job = run_job(
        &store,
        &repo.display().to_string(),
        &excavation,
        reporter.as_ref(),
    )
    .await?;

    match (job.status, job.report) {
        (Phase::Complete, Some(report)) => export::write_report(&report, output.as_deref()),
        _ => bail!(
            "Excavation failed: {}",
            job.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

fn run_classify(paths: &[String]) {
    println!("{:<40} {:<12} {:>6} {:>7}", "PATH", "LANGUAGE", "SOURCE", "IGNORED");
    println!("{}", "-".repeat(68));
    for path in paths {
        let c = classify::classify(path);
        println!(
            "{:<40} {:<12} {:>6} {:>7}",
            path,
            c.language,
            if c.is_source { "yes" } else { "no" },
            if c.is_ignored { "yes" } else { "no" }
        );
    }
}

async fn run_models(cfg: &Config) -> Result<()> {
    if !cfg.synthesis.is_enabled() {
        bail!("Synthesis is disabled. Set [synthesis] provider = \"gemini\" in the config.");
    }
    let client = GeminiSynthesizer::new(&cfg.synthesis)?;
    let models = client.list_models().await?;
    let preferred = excavator::synthesis::pick_model(&models);

    for m in &models {
        let name = m.name.trim_start_matches("models/");
        let marker = if preferred.as_deref() == Some(name) { "*" } else { " " };
        println!("{} {:<40} {}", marker, name, m.methods.join(","));
    }
    eprintln!("{} models ({} marks the default pick)", models.len(), "*");
    Ok(())
}
