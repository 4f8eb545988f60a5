//! Core data models produced by an excavation.
//!
//! These types flow from the history walker and file analyzer through the
//! graph builder and insight synthesizer into the final
//! [`ExcavationReport`], which is the only artifact a run hands back.
//! Everything serializes as camelCase JSON for report consumers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder used for dates when a file has no commit history.
pub const UNKNOWN_DATE: &str = "unknown";

/// One commit as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// ISO 8601 timestamp.
    pub date: String,
    /// Unified diff scoped to a single file, truncated to the diff budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Per-author contribution tallies over the scanned commit window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorStats {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub commits: usize,
    pub additions: u64,
    pub deletions: u64,
    pub first_commit: String,
    pub last_commit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub first: String,
    pub last: String,
}

/// Repository-wide statistics, independent of file selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    pub total_files: usize,
    pub total_commits: usize,
    pub total_authors: usize,
    pub languages: BTreeMap<String, usize>,
    pub top_authors: Vec<AuthorStats>,
    pub date_range: DateRange,
}

/// Quantitative metrics for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub lines: usize,
    pub complexity: usize,
    /// 0 to 100, higher is better.
    pub maintainability: u32,
    /// `kind:name` tags in source order.
    pub definitions: Vec<String>,
    /// Module specifiers in source order.
    pub imports: Vec<String>,
}

/// Structured judgment returned by the synthesis service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeVerdict {
    pub summary: String,
    pub business_context: String,
    pub technical_rationale: String,
    pub dependencies: Vec<String>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
}

/// Per-file analysis result. Created once during the analysis phase and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVerdict {
    pub path: String,
    pub language: String,
    pub metrics: FileMetrics,
    /// Newest first.
    pub commits: Vec<CommitRecord>,
    pub authors: BTreeSet<String>,
    pub analysis: Option<NarrativeVerdict>,
    pub last_modified: String,
    pub created_at: String,
}

impl FileVerdict {
    /// Number of commits in this file's slice authored by `author`.
    pub fn commits_by(&self, author: &str) -> usize {
        self.commits.iter().filter(|c| c.author == author).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Function,
    Class,
    Interface,
    Type,
    Author,
}

impl NodeType {
    /// Map a definition kind tag (`function`, `class`, ...) to a node type.
    pub fn from_definition_kind(kind: &str) -> Option<Self> {
        match kind {
            "function" => Some(NodeType::Function),
            "class" => Some(NodeType::Class),
            "interface" => Some(NodeType::Interface),
            "type" => Some(NodeType::Type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Defines,
    Authored,
    Imports,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    pub weight: f64,
}

/// Files sharing a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub clusters: Vec<Cluster>,
}

/// Advisory narrative lists derived from verdicts and statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub business_domains: Vec<String>,
    pub technical_debt: Vec<String>,
    pub risk_areas: Vec<String>,
    pub hotspots: Vec<String>,
    pub key_decisions: Vec<String>,
}

/// The root aggregate of one excavation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcavationReport {
    pub id: String,
    pub repository: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
    pub duration_ms: u64,
    pub model_used: String,
    pub stats: RepositoryStats,
    pub files: Vec<FileVerdict>,
    pub graph: KnowledgeGraph,
    pub insights: Insights,
}
