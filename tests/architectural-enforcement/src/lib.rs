//! Architectural Enforcement
//!
//! Source scanners backing the integration tests in `tests/`:
//! - No blocking I/O inside async functions
//! - No `std::thread::sleep` in production code
//!
//! Scanning is line based. Everything after a `#[cfg(test)]` line is treated
//! as test code, and text after `//` is ignored.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees checked by the tests, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["chat/core/src", "chat/cli/src"];

/// A rule broken at a specific line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the violation
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Which rule was broken
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

/// Workspace root, two levels above this crate
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Kind of function a line sits in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    /// Inside an `async fn`
    Async,
    /// Inside a plain `fn`
    Sync,
    /// Outside any function (or unknown)
    None,
}

/// Classify a function signature line, ignoring visibility and qualifiers
fn signature(line: &str) -> Option<Context> {
    let mut rest = line.trim_start();
    for prefix in ["pub(crate) ", "pub(super) ", "pub ", "const ", "unsafe "] {
        rest = rest.strip_prefix(prefix).unwrap_or(rest);
    }
    if rest.starts_with("async fn ") {
        Some(Context::Async)
    } else if rest.starts_with("fn ") {
        Some(Context::Sync)
    } else {
        None
    }
}

/// Find the function enclosing `lines[idx]` by scanning backwards
#[must_use]
pub fn enclosing_context(lines: &[&str], idx: usize) -> Context {
    lines[..=idx.min(lines.len().saturating_sub(1))]
        .iter()
        .rev()
        .find_map(|line| signature(code_part(line)))
        .unwrap_or(Context::None)
}

fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Check one file's source text against `rules`
///
/// Each rule is `(name, needle, only_in_async)`.
#[must_use]
pub fn scan_source(
    path: &Path,
    content: &str,
    rules: &[(&'static str, &str, bool)],
) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }
        let code = code_part(line);

        for &(rule, needle, only_in_async) in rules {
            if !code.contains(needle) {
                continue;
            }
            if only_in_async && enclosing_context(&lines, idx) != Context::Async {
                continue;
            }
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                rule,
                text: line.trim().to_string(),
            });
        }
    }

    violations
}

/// Scan every `.rs` file under the production directories
#[must_use]
pub fn scan_production(rules: &[(&'static str, &str, bool)]) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(path) {
                violations.extend(scan_source(path, &content, rules));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &[(&str, &str, bool)] = &[
        ("Blocking file I/O", "std::fs::", true),
        ("Thread sleep", "std::thread::sleep", false),
    ];

    #[test]
    fn test_blocking_io_in_async_fn_detected() {
        let source = "pub async fn load() {\n    let s = std::fs::read_to_string(\"x\");\n}\n";
        let violations = scan_source(Path::new("a.rs"), source, RULES);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
    }

    #[test]
    fn test_blocking_io_in_sync_fn_allowed() {
        let source = "fn load() {\n    let s = std::fs::read_to_string(\"x\");\n}\n";
        assert!(scan_source(Path::new("a.rs"), source, RULES).is_empty());
    }

    #[test]
    fn test_sleep_flagged_anywhere() {
        let source = "fn wait() {\n    std::thread::sleep(d);\n}\n";
        assert_eq!(scan_source(Path::new("a.rs"), source, RULES).len(), 1);
    }

    #[test]
    fn test_test_modules_and_comments_skipped() {
        let source = "// std::thread::sleep is banned\n#[cfg(test)]\nmod tests {\n    fn t() { std::thread::sleep(d); }\n}\n";
        assert!(scan_source(Path::new("a.rs"), source, RULES).is_empty());
    }

    #[test]
    fn test_signature_classification() {
        assert_eq!(signature("    pub(crate) async fn x() {"), Some(Context::Async));
        assert_eq!(signature("pub fn x() {"), Some(Context::Sync));
        assert_eq!(signature("let fn_name = 1;"), None);
    }
}
