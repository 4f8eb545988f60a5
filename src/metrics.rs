//! Lexical file metrics: line count, complexity, maintainability,
//! definitions, and imports.
//!
//! This is pattern matching over source text, not parsing. Complexity
//! counts occurrences of branch-like tokens (a McCabe-style approximation),
//! and definitions/imports are found with per-language regexes. Known blind
//! spots: re-exports, multi-line destructured imports, decorated or
//! generated classes, and anything built by macros or metaprogramming.
//! Insight thresholds are tuned against this behavior, so keep it lexical.
//!
//! Every function here is pure and deterministic.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::FileMetrics;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

static COMPLEXITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bif\b",
        r"\belse\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bswitch\b",
        r"\bcase\b",
        r"\bcatch\b",
        r"\?[^:\n]*:",
        r"&&",
        r"\|\|",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});

static SCRIPT_DEFINITIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("function", re(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)")),
        (
            "function",
            re(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>"),
        ),
        ("class", re(r"\bclass\s+([A-Za-z_$][\w$]*)")),
        ("interface", re(r"\binterface\s+([A-Za-z_$][\w$]*)")),
        ("type", re(r"\btype\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*=")),
    ]
});

static PYTHON_DEFINITIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("function", re(r"(?m)^\s*(?:async\s+)?def\s+(\w+)")),
        ("class", re(r"(?m)^\s*class\s+(\w+)")),
    ]
});

static SCRIPT_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r#"\bfrom\s+['"]([^'"]+)['"]"#),
        re(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#),
    ]
});

static PYTHON_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?m)^\s*from\s+([\w.]+)\s+import\b"),
        re(r"(?m)^\s*import\s+([\w.]+)"),
    ]
});

const LONG_LINE_CHARS: usize = 120;
const LONG_LINE_LIMIT: usize = 10;
const MIN_COMMENT_RATIO: f64 = 0.05;

/// Compute all metrics for `code` written in `language`.
pub fn extract(code: &str, language: &str) -> FileMetrics {
    let lines = count_lines(code);
    let complexity = complexity(code);
    FileMetrics {
        lines,
        complexity,
        maintainability: maintainability(code, lines, complexity),
        definitions: definitions(code, language),
        imports: imports(code, language),
    }
}

/// Newline-delimited segments. A trailing newline counts as one more
/// (empty) segment, and the empty string is one line.
pub fn count_lines(code: &str) -> usize {
    code.split('\n').count()
}

/// 1 plus one per occurrence of each branch-like token pattern. Patterns
/// are scanned independently, so `if (a && b)` scores both.
pub fn complexity(code: &str) -> usize {
    1 + COMPLEXITY_PATTERNS
        .iter()
        .map(|p| p.find_iter(code).count())
        .sum::<usize>()
}

/// 0 to 100. Only the highest crossed tier applies for size and for
/// complexity.
pub fn maintainability(code: &str, lines: usize, complexity: usize) -> u32 {
    let mut score: i64 = 100;

    score -= if lines > 500 {
        20
    } else if lines > 300 {
        10
    } else if lines > 100 {
        5
    } else {
        0
    };

    score -= if complexity > 50 {
        30
    } else if complexity > 30 {
        20
    } else if complexity > 15 {
        10
    } else {
        0
    };

    let long_lines = code
        .split('\n')
        .filter(|l| l.chars().count() > LONG_LINE_CHARS)
        .count();
    if long_lines > LONG_LINE_LIMIT {
        score -= 10;
    }

    let comment_lines = code
        .split('\n')
        .map(str::trim)
        .filter(|l| l.starts_with("//") || l.starts_with('#') || l.starts_with('*'))
        .count();
    let ratio = comment_lines as f64 / lines.max(1) as f64;
    if ratio < MIN_COMMENT_RATIO {
        score -= 10;
    }

    score.clamp(0, 100) as u32
}

pub fn is_script_family(language: &str) -> bool {
    matches!(language, "typescript" | "javascript")
}

/// `kind:name` tags ordered by match position. Duplicates are kept.
pub fn definitions(code: &str, language: &str) -> Vec<String> {
    let patterns: &[(&str, Regex)] = if is_script_family(language) {
        &SCRIPT_DEFINITIONS
    } else if language == "python" {
        &PYTHON_DEFINITIONS
    } else {
        return Vec::new();
    };

    let mut found: Vec<(usize, String)> = Vec::new();
    for (kind, pattern) in patterns {
        for caps in pattern.captures_iter(code) {
            if let Some(name) = caps.get(1) {
                found.push((name.start(), format!("{}:{}", kind, name.as_str())));
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, tag)| tag).collect()
}

/// Module specifiers ordered by match position.
pub fn imports(code: &str, language: &str) -> Vec<String> {
    let patterns: &[Regex] = if is_script_family(language) {
        &SCRIPT_IMPORTS
    } else if language == "python" {
        &PYTHON_IMPORTS
    } else {
        return Vec::new();
    };

    let mut found: Vec<(usize, String)> = patterns
        .iter()
        .flat_map(|p| p.captures_iter(code))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, module)| module).collect()
}
