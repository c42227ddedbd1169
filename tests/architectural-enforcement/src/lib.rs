//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the notification core single-threaded and
//! cooperative:
//! - No thread spawning
//! - No sleeping (the loop's bounded wait lives in the daemon)
//! - No locks around notification state
//!
//! Only production code is scanned: everything from a file's first
//! `#[cfg(test)]` on is skipped, as are comments.

use std::fs;
use std::path::{Path, PathBuf};

/// One forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the pattern was found in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule was broken
    pub rule: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// A substring that must not appear in production code
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Substring to look for
    pub pattern: &'static str,
    /// Description used in reports
    pub name: &'static str,
}

/// Source directory of the notification core
#[must_use]
pub fn core_source_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("notifyd")
        .join("core")
        .join("src")
}

/// Code lines of a source text, before its test module, without comments
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        let code = line.split("//").next().unwrap_or(line);
        lines.push((idx + 1, code));
    }
    lines
}

/// Check one source text against `rules`
#[must_use]
pub fn check_source(path: &Path, content: &str, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (line, code) in production_lines(content) {
        for rule in rules {
            if code.contains(rule.pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line,
                    rule: rule.name,
                    text: code.trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Check every `.rs` file under `dir` against `rules`
#[must_use]
pub fn check_directory(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(entry.path()) else {
            continue;
        };
        violations.extend(check_source(entry.path(), &content, rules));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLEEP: Rule = Rule {
        pattern: "sleep(",
        name: "sleep",
    };

    #[test]
    fn test_test_module_is_skipped() {
        let src = "fn a() {}\n#[cfg(test)]\nmod tests { fn b() { sleep(1) } }\n";
        assert!(check_source(Path::new("x.rs"), src, &[SLEEP]).is_empty());
    }

    #[test]
    fn test_comments_are_skipped() {
        let src = "// sleep(1) here\nlet x = 1; // sleep(2)\n";
        assert!(check_source(Path::new("x.rs"), src, &[SLEEP]).is_empty());
    }

    #[test]
    fn test_violation_reports_line() {
        let src = "fn a() {}\nfn b() { std::thread::sleep(d) }\n";
        let found = check_source(Path::new("x.rs"), src, &[SLEEP]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].rule, "sleep");
    }

    #[test]
    fn test_core_dir_exists() {
        assert!(core_source_dir().join("lib.rs").exists());
    }
}
