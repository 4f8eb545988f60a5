//! Insight synthesis: advisory narrative lists over a set of verdicts.
//!
//! Keyword and threshold heuristics only. Output is order-of-magnitude
//! guidance, not verified fact. Verdicts without an analysis contribute
//! only their metrics and commit counts.

use std::collections::BTreeSet;
use std::path::Path;

use crate::models::{FileVerdict, Insights, RepositoryStats};

const DOMAIN_KEYWORDS: &[(&str, &str)] = &[
    ("auth", "authentication"),
    ("payment", "payments"),
    ("user", "user-management"),
    ("api", "api"),
    ("database", "data-layer"),
    ("data", "data-layer"),
];

const DEBT_KEYWORDS: &[&str] = &["refactor", "technical debt", "cleanup", "deprecated"];

pub const DEBT_COMPLEXITY_THRESHOLD: usize = 20;
pub const RISK_MAINTAINABILITY_THRESHOLD: u32 = 50;
pub const MIN_RISK_CHARS: usize = 10;
pub const DECISION_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const MAX_DEBT_ITEMS: usize = 10;
pub const MAX_RISK_ITEMS: usize = 10;
pub const MAX_KEY_DECISIONS: usize = 5;
pub const MAX_HOTSPOTS: usize = 5;
const DECISION_CHARS: usize = 200;

/// Derive the insight lists. `_stats` is accepted for parity with the
/// graph builder; the current heuristics look only at verdicts.
pub fn synthesize(verdicts: &[FileVerdict], _stats: &RepositoryStats) -> Insights {
    Insights {
        business_domains: business_domains(verdicts),
        technical_debt: technical_debt(verdicts),
        risk_areas: risk_areas(verdicts),
        hotspots: hotspots(verdicts),
        key_decisions: key_decisions(verdicts),
    }
}

fn business_domains(verdicts: &[FileVerdict]) -> Vec<String> {
    let mut domains = BTreeSet::new();
    for analysis in verdicts.iter().filter_map(|v| v.analysis.as_ref()) {
        let context = analysis.business_context.to_lowercase();
        for (keyword, domain) in DOMAIN_KEYWORDS {
            if context.contains(keyword) {
                domains.insert(domain.to_string());
            }
        }
    }
    domains.into_iter().collect()
}

fn technical_debt(verdicts: &[FileVerdict]) -> Vec<String> {
    let mut items = Vec::new();
    for v in verdicts {
        if let Some(analysis) = &v.analysis {
            for rec in &analysis.recommendations {
                let lower = rec.to_lowercase();
                if DEBT_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    items.push(rec.clone());
                }
            }
        }
        if v.metrics.complexity > DEBT_COMPLEXITY_THRESHOLD {
            items.push(format!(
                "{} has high complexity ({})",
                v.path, v.metrics.complexity
            ));
        }
    }
    dedup_capped(items, MAX_DEBT_ITEMS)
}

fn risk_areas(verdicts: &[FileVerdict]) -> Vec<String> {
    let mut items = Vec::new();
    for v in verdicts {
        if let Some(analysis) = &v.analysis {
            items.extend(
                analysis
                    .risks
                    .iter()
                    .filter(|r| r.trim().chars().count() > MIN_RISK_CHARS)
                    .cloned(),
            );
        }
        if v.metrics.maintainability < RISK_MAINTAINABILITY_THRESHOLD {
            items.push(format!(
                "{} has low maintainability ({}/100)",
                v.path, v.metrics.maintainability
            ));
        }
    }
    dedup_capped(items, MAX_RISK_ITEMS)
}

fn key_decisions(verdicts: &[FileVerdict]) -> Vec<String> {
    verdicts
        .iter()
        .filter_map(|v| {
            let analysis = v.analysis.as_ref()?;
            let rationale = analysis.technical_rationale.trim();
            if rationale.is_empty() || analysis.confidence_score <= DECISION_CONFIDENCE_THRESHOLD {
                return None;
            }
            let name = Path::new(&v.path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| v.path.clone());
            let text: String = rationale.chars().take(DECISION_CHARS).collect();
            Some(format!("{}: {}", name, text))
        })
        .take(MAX_KEY_DECISIONS)
        .collect()
}

fn hotspots(verdicts: &[FileVerdict]) -> Vec<String> {
    let mut ranked: Vec<&FileVerdict> = verdicts.iter().collect();
    ranked.sort_by(|a, b| b.commits.len().cmp(&a.commits.len()));
    ranked
        .into_iter()
        .take(MAX_HOTSPOTS)
        .map(|v| format!("{} ({} commits)", v.path, v.commits.len()))
        .collect()
}

/// Drop repeats (keeping first occurrence) and cap the length.
fn dedup_capped(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitRecord, FileMetrics, NarrativeVerdict};
    use std::collections::BTreeSet;

    fn verdict(path: &str, complexity: usize, maintainability: u32, commits: usize) -> FileVerdict {
        FileVerdict {
            path: path.into(),
            language: "typescript".into(),
            metrics: FileMetrics {
                lines: 10,
                complexity,
                maintainability,
                definitions: vec![],
                imports: vec![],
            },
            commits: (0..commits)
                .map(|i| CommitRecord {
                    hash: format!("h{i}"),
                    message: "m".into(),
                    author: "Ada".into(),
                    email: None,
                    date: "2024-01-01T00:00:00Z".into(),
                    diff: None,
                })
                .collect(),
            authors: BTreeSet::new(),
            analysis: None,
            last_modified: "unknown".into(),
            created_at: "unknown".into(),
        }
    }

    fn with_analysis(mut v: FileVerdict, analysis: NarrativeVerdict) -> FileVerdict {
        v.analysis = Some(analysis);
        v
    }

    #[test]
    fn test_no_analysis_does_not_panic() {
        let verdicts = vec![verdict("a.ts", 1, 100, 0), verdict("b.ts", 3, 90, 2)];
        let insights = synthesize(&verdicts, &RepositoryStats::default());
        assert!(insights.business_domains.is_empty());
        assert!(insights.technical_debt.is_empty());
        assert!(insights.risk_areas.is_empty());
        assert!(insights.key_decisions.is_empty());
        assert_eq!(insights.hotspots.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let insights = synthesize(&[], &RepositoryStats::default());
        assert_eq!(insights, Insights::default());
    }

    #[test]
    fn test_business_domains() {
        let verdicts = vec![
            with_analysis(
                verdict("a.ts", 1, 100, 1),
                NarrativeVerdict {
                    business_context: "Handles user Authentication and sessions".into(),
                    ..NarrativeVerdict::default()
                },
            ),
            with_analysis(
                verdict("b.ts", 1, 100, 1),
                NarrativeVerdict {
                    business_context: "Payment capture through the billing API".into(),
                    ..NarrativeVerdict::default()
                },
            ),
        ];
        let domains = synthesize(&verdicts, &RepositoryStats::default()).business_domains;
        for expected in ["authentication", "user-management", "payments", "api"] {
            assert!(domains.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(!domains.contains(&"data-layer".to_string()));
    }

    #[test]
    fn test_technical_debt_from_keywords_and_complexity() {
        let verdicts = vec![
            with_analysis(
                verdict("a.ts", 1, 100, 1),
                NarrativeVerdict {
                    recommendations: vec![
                        "Refactor the session cache".into(),
                        "Add more tests".into(),
                        "Remove DEPRECATED endpoints".into(),
                    ],
                    ..NarrativeVerdict::default()
                },
            ),
            verdict("src/tangled.ts", 21, 100, 1),
            verdict("src/fine.ts", 20, 100, 1),
        ];
        let debt = synthesize(&verdicts, &RepositoryStats::default()).technical_debt;
        assert_eq!(debt.len(), 3);
        assert!(debt.iter().any(|d| d.contains("session cache")));
        assert!(debt.iter().any(|d| d.contains("src/tangled.ts") && d.contains("21")));
        assert!(!debt.iter().any(|d| d.contains("src/fine.ts")));
    }

    #[test]
    fn test_debt_deduplicated_and_capped() {
        let mut verdicts: Vec<FileVerdict> = (0..15)
            .map(|i| verdict(&format!("f{i}.ts"), 30, 100, 1))
            .collect();
        let rec = NarrativeVerdict {
            recommendations: vec!["Cleanup needed".into()],
            ..NarrativeVerdict::default()
        };
        verdicts[0].analysis = Some(rec.clone());
        verdicts[1].analysis = Some(rec);
        let debt = synthesize(&verdicts, &RepositoryStats::default()).technical_debt;
        assert_eq!(debt.len(), MAX_DEBT_ITEMS);
        assert_eq!(debt.iter().filter(|d| *d == "Cleanup needed").count(), 1);
    }

    #[test]
    fn test_risk_areas() {
        let verdicts = vec![
            with_analysis(
                verdict("a.ts", 1, 100, 1),
                NarrativeVerdict {
                    risks: vec!["none".into(), "".into(), "Race condition on token refresh".into()],
                    ..NarrativeVerdict::default()
                },
            ),
            verdict("src/legacy.ts", 1, 40, 1),
        ];
        let risks = synthesize(&verdicts, &RepositoryStats::default()).risk_areas;
        assert_eq!(risks.len(), 2);
        assert!(risks.iter().any(|r| r.contains("Race condition")));
        assert!(risks.iter().any(|r| r.contains("src/legacy.ts")));
    }

    #[test]
    fn test_key_decisions_require_confidence_and_rationale() {
        let confident = |rationale: &str, confidence: f64| NarrativeVerdict {
            technical_rationale: rationale.into(),
            confidence_score: confidence,
            ..NarrativeVerdict::default()
        };
        let verdicts = vec![
            with_analysis(verdict("src/a.ts", 1, 100, 1), confident("Chose polling over websockets", 0.9)),
            with_analysis(verdict("src/b.ts", 1, 100, 1), confident("Unsure", 0.7)),
            with_analysis(verdict("src/c.ts", 1, 100, 1), confident("", 0.95)),
            with_analysis(verdict("src/d.ts", 1, 100, 1), confident(&"x".repeat(500), 0.8)),
        ];
        let decisions = synthesize(&verdicts, &RepositoryStats::default()).key_decisions;
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0], "a.ts: Chose polling over websockets");
        assert!(decisions[1].starts_with("d.ts: "));
        assert_eq!(decisions[1].chars().count(), "d.ts: ".len() + 200);
    }

    #[test]
    fn test_hotspots_ranked_by_commit_count() {
        let verdicts: Vec<FileVerdict> = (0..7)
            .map(|i| verdict(&format!("f{i}.ts"), 1, 100, i))
            .collect();
        let hotspots = synthesize(&verdicts, &RepositoryStats::default()).hotspots;
        assert_eq!(hotspots.len(), MAX_HOTSPOTS);
        assert_eq!(hotspots[0], "f6.ts (6 commits)");
        assert_eq!(hotspots[4], "f2.ts (2 commits)");
    }
}
