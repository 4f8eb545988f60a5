//! # Excavator
//!
//! Repository archaeology: walk a git repository's history and current
//! files and produce one self-contained report explaining who built what,
//! how the pieces relate, and where the risk lives.
//!
//! Each run collects repository statistics, picks a bounded set of source
//! files, computes lexical metrics and commit history for each, optionally
//! asks an external language model for a narrative verdict, and folds the
//! results into a knowledge graph plus a list of insights.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │   git    │──▶│  History  │──▶│  Analyzer │──▶│  Graph + │
//! │  (vcs)   │   │  Walker   │   │ metrics + │   │ Insights │
//! └──────────┘   └───────────┘   │ synthesis │   └────┬─────┘
//!                                └───────────┘        ▼
//!                                               ┌──────────┐
//!                                               │  Report  │
//!                                               │  (JSON)  │
//!                                               └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dig stats ./my-repo                           # repository overview
//! dig excavate ./my-repo --skip-analysis        # metrics, history, graph
//! dig excavate ./my-repo --output report.json   # with narrative synthesis
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`classify`] | Language and source-file classification by path |
//! | [`metrics`] | Lines, complexity, maintainability, definitions, imports |
//! | [`vcs`] | Version-control query abstraction and git backend |
//! | [`history`] | Repository statistics and per-file commit history |
//! | [`synthesis`] | Narrative-synthesis provider abstraction |
//! | [`rate_limit`] | Minimum spacing between outbound calls |
//! | [`analyzer`] | One verdict per file |
//! | [`graph`] | Knowledge-graph construction |
//! | [`insights`] | Heuristic insight lists |
//! | [`excavate`] | Run orchestration and lifecycle |
//! | [`jobs`] | Job records for tracked runs |
//! | [`progress`] | Progress reporting |
//! | [`export`] | Report output |
//! | [`stats`] | Statistics overview |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Report data types |
//! | [`error`] | Typed pipeline errors |

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod error;
pub mod excavate;
pub mod export;
pub mod graph;
pub mod history;
pub mod insights;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod rate_limit;
pub mod stats;
pub mod synthesis;
pub mod vcs;
