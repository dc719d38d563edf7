//! Integration Test: Async Discipline
//!
//! **Policy**: Production code in the client core and CLI must not block the
//! runtime. Answers are streamed on a tokio task; a blocking call stalls every
//! token behind it.
//!
//! **Required**: `tokio::fs`, `tokio::io::stdout()`, async `reqwest`,
//! `tokio::time::sleep`. Blocking calls are acceptable in plain `fn`s that run
//! before the runtime starts (e.g. config loading).

use architectural_enforcement::{scan_production, workspace_root, PRODUCTION_DIRS};

const ASYNC_RULES: &[(&str, &str, bool)] = &[
    ("Blocking file I/O", "std::fs::", true),
    ("Blocking network I/O", "std::net::", true),
    ("Blocking stdin/stdout", "std::io::stdout()", true),
    ("Blocking stdin/stdout", "std::io::stdin()", true),
    ("Blocking process I/O", "std::process::Command", true),
];

const ANYWHERE_RULES: &[(&str, &str, bool)] = &[
    ("Blocking HTTP client", "reqwest::blocking", false),
    ("Thread sleep", "std::thread::sleep", false),
];

fn report(kind: &str, rules: &[(&'static str, &str, bool)]) {
    let violations = scan_production(rules);
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {kind} found in production code:\n");
    for violation in &violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[test]
fn test_production_dirs_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_DIRS {
        assert!(root.join(dir).is_dir(), "missing source dir: {dir}");
    }
}

#[test]
fn test_no_blocking_io_in_async_code() {
    report("Blocking I/O in async functions", ASYNC_RULES);
}

#[test]
fn test_no_blocking_http_or_sleep() {
    report("Blocking HTTP or thread sleep", ANYWHERE_RULES);
}
