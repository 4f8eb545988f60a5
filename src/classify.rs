//! Path classification: language tag, source allow-list, ignore deny-list.
//!
//! Pure string functions, no filesystem access.
//!
//! The ignore check is substring containment against the whole path, not
//! path-segment equality. `src/bin/x.ts` is ignored because it contains
//! `/bin/`, while `mybin/x.ts` is not. Paths that merely contain a deny-list
//! name (`rebuild/`, `distance.ts`) can be over-matched; callers needing
//! segment-exact exclusion must filter themselves.

use serde::Serialize;
use std::path::Path;

const LANGUAGES: &[(&str, &str)] = &[
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("py", "python"),
    ("rs", "rust"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("rb", "ruby"),
    ("php", "php"),
    ("cs", "csharp"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("c", "c"),
    ("h", "c"),
    ("swift", "swift"),
    ("scala", "scala"),
];

const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "kt", "rb", "php", "cs",
    "cpp", "cc", "c", "h", "hpp", "swift", "scala", "vue", "svelte",
];

const IGNORED_PATTERNS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    ".git",
    "target",
    "__pycache__",
    ".next",
    "coverage",
    "/bin/",
    "/obj/",
];

/// Classification of a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub language: String,
    pub is_source: bool,
    pub is_ignored: bool,
}

impl Classification {
    /// Source file outside any ignored directory.
    pub fn is_analyzable(&self) -> bool {
        self.is_source && !self.is_ignored
    }
}

pub fn classify(path: &str) -> Classification {
    let ext = extension(path);
    Classification {
        language: language_for_extension(&ext).to_string(),
        is_source: SOURCE_EXTENSIONS.contains(&ext.as_str()),
        is_ignored: is_ignored(path),
    }
}

pub fn language_for_path(path: &str) -> &'static str {
    language_for_extension(&extension(path))
}

pub fn is_analyzable(path: &str) -> bool {
    classify(path).is_analyzable()
}

fn is_ignored(path: &str) -> bool {
    IGNORED_PATTERNS.iter().any(|p| path.contains(p))
}

fn language_for_extension(ext: &str) -> &'static str {
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or("unknown")
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(classify("src/app.ts").language, "typescript");
        assert_eq!(classify("src/App.TSX").language, "typescript");
        assert_eq!(classify("lib/util.py").language, "python");
        assert_eq!(classify("main.rs").language, "rust");
        assert_eq!(classify("README.md").language, "unknown");
        assert_eq!(classify("Makefile").language, "unknown");
    }

    #[test]
    fn test_source_allow_list_is_wider_than_language_table() {
        let vue = classify("components/Button.vue");
        assert!(vue.is_source);
        assert_eq!(vue.language, "unknown");
        assert!(classify("x.svelte").is_source);
        assert!(!classify("notes.txt").is_source);
    }

    #[test]
    fn test_node_modules_anywhere_is_ignored() {
        assert!(classify("node_modules/react/index.js").is_ignored);
        assert!(classify("packages/web/node_modules/a/b.ts").is_ignored);
        assert!(!classify("src/index.ts").is_ignored);
    }

    #[test]
    fn test_substring_matching_over_matches() {
        assert!(classify("src/bin/x.ts").is_ignored);
        assert!(!classify("mybin/x.ts").is_ignored);
        // Incidental substring: "distance" contains "dist".
        assert!(classify("src/distance.ts").is_ignored);
    }

    #[test]
    fn test_analyzable() {
        assert!(is_analyzable("src/a.ts"));
        assert!(!is_analyzable("dist/a.js"));
        assert!(!is_analyzable("docs/a.md"));
    }

    #[test]
    fn test_deterministic() {
        let a = classify("web/src/api/client.tsx");
        let b = classify("web/src/api/client.tsx");
        assert_eq!(a, b);
    }
}
