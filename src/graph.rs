//! Knowledge-graph construction from file verdicts.
//!
//! Nodes are files, definitions, and authors; edges are `defines`,
//! `authored`, and `imports`. Node ids are namespaced by kind and a later
//! duplicate id is never re-added. Every edge endpoint is a node that was
//! added before the edge.
//!
//! Import resolution is a loose substring match against other verdicts'
//! paths and costs O(files × imports × files). That is fine at tens of
//! files per run; index paths by stem before raising the file cap much.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::models::{
    Cluster, FileVerdict, GraphEdge, GraphNode, KnowledgeGraph, NodeType, Relationship,
    RepositoryStats,
};

/// Definition nodes emitted per file.
pub const MAX_DEFINITIONS_PER_FILE: usize = 5;
/// Author nodes emitted, taken from the head of `top_authors`.
pub const MAX_AUTHOR_NODES: usize = 10;
pub const DEFINES_WEIGHT: f64 = 1.0;
/// Imports are matched heuristically, so they weigh less than a definition.
pub const IMPORTS_WEIGHT: f64 = 0.8;

#[derive(Default)]
struct GraphAssembler {
    graph: KnowledgeGraph,
    ids: HashSet<String>,
}

impl GraphAssembler {
    fn add_node(&mut self, id: String, node_type: NodeType, label: String, metadata: Value) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.graph.nodes.push(GraphNode {
            id,
            node_type,
            label,
            metadata,
        });
    }

    fn add_edge(&mut self, source: &str, target: &str, relationship: Relationship, weight: f64) {
        if !(self.ids.contains(source) && self.ids.contains(target)) {
            return;
        }
        self.graph.edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            relationship,
            weight,
        });
    }
}

pub fn file_node_id(path: &str) -> String {
    format!("file:{}", path)
}

pub fn author_node_id(name: &str) -> String {
    format!("author:{}", name)
}

pub fn build_graph(verdicts: &[FileVerdict], stats: &RepositoryStats) -> KnowledgeGraph {
    let mut g = GraphAssembler::default();

    for v in verdicts {
        g.add_node(
            file_node_id(&v.path),
            NodeType::File,
            file_label(&v.path),
            json!({
                "path": v.path,
                "language": v.language,
                "lines": v.metrics.lines,
                "complexity": v.metrics.complexity,
                "maintainability": v.metrics.maintainability,
            }),
        );
    }

    for v in verdicts {
        let file_id = file_node_id(&v.path);
        for tag in v.metrics.definitions.iter().take(MAX_DEFINITIONS_PER_FILE) {
            let Some((kind, name)) = tag.split_once(':') else {
                continue;
            };
            let Some(node_type) = NodeType::from_definition_kind(kind) else {
                continue;
            };
            let def_id = format!("{}:{}:{}", kind, v.path, name);
            g.add_node(
                def_id.clone(),
                node_type,
                name.to_string(),
                json!({ "file": v.path, "kind": kind }),
            );
            g.add_edge(&file_id, &def_id, Relationship::Defines, DEFINES_WEIGHT);
        }
    }

    for author in stats.top_authors.iter().take(MAX_AUTHOR_NODES) {
        let author_id = author_node_id(&author.name);
        g.add_node(
            author_id.clone(),
            NodeType::Author,
            author.name.clone(),
            json!({
                "email": author.email,
                "commits": author.commits,
                "firstCommit": author.first_commit,
                "lastCommit": author.last_commit,
            }),
        );
        for v in verdicts.iter().filter(|v| v.authors.contains(&author.name)) {
            let count = v.commits_by(&author.name);
            if count > 0 {
                g.add_edge(
                    &author_id,
                    &file_node_id(&v.path),
                    Relationship::Authored,
                    count as f64,
                );
            }
        }
    }

    for v in verdicts {
        for import in &v.metrics.imports {
            if let Some(target) = resolve_import(import, &v.path, verdicts) {
                g.add_edge(
                    &file_node_id(&v.path),
                    &file_node_id(&target.path),
                    Relationship::Imports,
                    IMPORTS_WEIGHT,
                );
            }
        }
    }

    g.graph.clusters = cluster_by_directory(verdicts);
    g.graph
}

/// First other verdict whose path contains the import specifier after one
/// leading `./` or `../` is removed. External packages normally match
/// nothing and are dropped.
fn resolve_import<'v>(import: &str, from: &str, verdicts: &'v [FileVerdict]) -> Option<&'v FileVerdict> {
    let needle = import
        .strip_prefix("./")
        .or_else(|| import.strip_prefix("../"))
        .unwrap_or(import);
    if needle.is_empty() {
        return None;
    }
    verdicts
        .iter()
        .find(|v| v.path != from && v.path.contains(needle))
}

fn cluster_by_directory(verdicts: &[FileVerdict]) -> Vec<Cluster> {
    let mut dirs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for v in verdicts {
        let dir = Path::new(&v.path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = if dir.is_empty() { "root".to_string() } else { dir };
        dirs.entry(name).or_default().push(file_node_id(&v.path));
    }
    dirs.into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(name, node_ids)| Cluster { name, node_ids })
        .collect()
}

fn file_label(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
