//! Write an excavation report as JSON.
//!
//! The report is the machine-readable product of `dig excavate`. It goes to
//! a file when `--output` is given, otherwise to stdout for piping into
//! other tools.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::ExcavationReport;

/// Serialize `report` as pretty JSON.
///
/// If `output` is `Some`, writes to that file path (creating parent
/// directories). Otherwise writes to stdout.
pub fn write_report(report: &ExcavationReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory: {}", parent.display())
                    })?;
                }
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            eprintln!(
                "Wrote report for {} ({} files, {} nodes, {} edges) to {}",
                report.repository,
                report.files.len(),
                report.graph.nodes.len(),
                report.graph.edges.len(),
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Insights, KnowledgeGraph, RepositoryStats};

    fn report() -> ExcavationReport {
        ExcavationReport {
            id: "r1".into(),
            repository: "fixture".into(),
            timestamp: "2024-01-01T00:00:00+00:00".into(),
            duration_ms: 12,
            model_used: "none".into(),
            stats: RepositoryStats::default(),
            files: vec![],
            graph: KnowledgeGraph::default(),
            insights: Insights::default(),
        }
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/report.json");
        write_report(&report(), Some(&path)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"modelUsed\": \"none\""));
        assert!(raw.contains("\"durationMs\": 12"));

        let back: ExcavationReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.id, "r1");
    }
}
