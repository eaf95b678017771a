use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Files the generator must never touch, matched by basename.
const BLOCKED_FILES: &[&str] = &[".env", "package-lock.json", "yarn.lock", "bun.lockb"];

const BLOCKED_PATTERN_SOURCES: &[&str] = &[r"\.env\.", r"config\.toml$"];

const DANGEROUS_PATTERN_SOURCES: &[&str] = &[
    r"eval\s*\(",
    r"process\.exit",
    r"rm\s+-rf",
    r#"require\s*\(\s*['"]child_process"#,
    r"exec\s*\(",
];

/// Outcome of patch validation. Transient — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct DiffValidator {
    dangerous: Vec<Regex>,
    blocked_patterns: Vec<Regex>,
}

static VALIDATOR: LazyLock<DiffValidator> = LazyLock::new(DiffValidator::new);

impl Default for DiffValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffValidator {
    pub fn new() -> Self {
        Self {
            dangerous: DANGEROUS_PATTERN_SOURCES
                .iter()
                .map(|src| Regex::new(src).expect("valid dangerous pattern"))
                .collect(),
            blocked_patterns: BLOCKED_PATTERN_SOURCES
                .iter()
                .map(|src| Regex::new(src).expect("valid blocked pattern"))
                .collect(),
        }
    }

    /// Every check accumulates into `errors`; nothing short-circuits, so one
    /// call surfaces all violations at once.
    pub fn validate(
        &self,
        patch: &str,
        allowed_files: Option<&[String]>,
        base_path: Option<&str>,
    ) -> DiffValidation {
        let mut errors = Vec::new();

        if !patch.contains("---") {
            errors.push("Missing source file header (---)".to_string());
        }
        if !patch.contains("+++") {
            errors.push("Missing target file header (+++)".to_string());
        }
        if !patch.contains("@@") {
            errors.push("Missing hunk header (@@)".to_string());
        }

        for pattern in &self.dangerous {
            if pattern.is_match(patch) {
                errors.push(format!("Dangerous pattern: {}", pattern.as_str()));
            }
        }

        let targets = extract_target_paths(patch);
        for path in &targets {
            if self.is_blocked_file(path) {
                errors.push(format!("Blocked file: {path}"));
            }
        }
        if let Some(allowed) = allowed_files {
            for path in &targets {
                if !allowed.iter().any(|a| a == path) {
                    errors.push(format!("File not in allowed list: {path}"));
                }
            }
        }
        if let Some(base) = base_path {
            let base = base.trim_start_matches('/');
            for path in &targets {
                if !path.starts_with(base) {
                    errors.push(format!("File outside base_path: {path}"));
                }
            }
        }

        DiffValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn is_blocked_file(&self, path: &str) -> bool {
        let basename = path.rsplit('/').next().unwrap_or("");
        if BLOCKED_FILES.contains(&basename) {
            return true;
        }
        self.blocked_patterns.iter().any(|p| p.is_match(path))
    }
}

/// Validates a candidate unified diff with the shared validator instance.
pub fn validate_patch(
    patch: &str,
    allowed_files: Option<&[String]>,
    base_path: Option<&str>,
) -> DiffValidation {
    VALIDATOR.validate(patch, allowed_files, base_path)
}

/// Target paths named by `+++ b/<path>` markers.
pub fn extract_target_paths(patch: &str) -> Vec<String> {
    patch
        .lines()
        .filter_map(|line| line.strip_prefix("+++ b/"))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_PATCH: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1 +1 @@\n-old\n+new\n";

    #[test]
    fn well_formed_patch_is_valid_with_zero_errors() {
        let result = validate_patch(
            GOOD_PATCH,
            Some(&["src/lib.rs".to_string()]),
            Some("/src"),
        );
        assert!(result.valid, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_hunk_dangerous_code_and_blocked_file_yield_three_errors() {
        let patch = "--- a/.env\n+++ b/.env\n+SECRET=eval(x)\n";
        let result = validate_patch(patch, None, None);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3, "errors: {:?}", result.errors);
        assert!(result.errors[0].contains("hunk header"));
        assert!(result.errors[1].contains("Dangerous pattern"));
        assert!(result.errors[2].contains("Blocked file: .env"));
    }

    #[test]
    fn each_dangerous_pattern_is_reported_individually() {
        let patch = "--- a/x.js\n+++ b/x.js\n@@ -1 +1 @@\n+eval(payload); exec(cmd); rm -rf /tmp\n";
        let result = validate_patch(patch, None, None);
        let dangerous: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.starts_with("Dangerous pattern"))
            .collect();
        assert_eq!(dangerous.len(), 3);
    }

    #[test]
    fn lockfiles_and_env_variants_are_blocked() {
        for path in [
            "package-lock.json",
            "deep/nested/yarn.lock",
            "bun.lockb",
            "app/.env.production",
            "ops/config.toml",
        ] {
            let patch = format!("--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n+x\n");
            let result = validate_patch(&patch, None, None);
            assert!(
                result.errors.iter().any(|e| e.starts_with("Blocked file")),
                "{path} should be blocked: {:?}",
                result.errors
            );
        }
    }

    #[test]
    fn allowlist_and_base_path_are_checked_independently() {
        let patch = "--- a/docs/readme.md\n+++ b/docs/readme.md\n@@ -1 +1 @@\n+x\n";
        let result = validate_patch(
            patch,
            Some(&["src/lib.rs".to_string()]),
            Some("/src"),
        );
        assert!(!result.valid);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("not in allowed list"))
        );
        assert!(result.errors.iter().any(|e| e.contains("outside base_path")));
    }

    #[test]
    fn extracts_only_target_markers() {
        let patch = "--- a/old.rs\n+++ b/new.rs\n@@ -1 +1 @@\n+++ not a marker in body? no\n";
        assert_eq!(extract_target_paths(patch), vec!["new.rs".to_string()]);
    }
}
