//! Structural tests for layer boundaries.
//!
//! These scan the source tree so a stray import or print macro fails the
//! build's tests rather than slipping through review.

use std::path::{Path, PathBuf};

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("rs"))
        .collect()
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

/// Track brace depth and report whether a line sits inside a `#[cfg(test)]`
/// block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-comment production lines of every file under `dir`, with their
/// one-based line numbers.
fn production_lines(dir: &Path) -> Vec<(String, usize, String)> {
    let mut out = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = relative(&file);
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") || trimmed.starts_with('*') {
                continue;
            }
            out.push((rel.clone(), i + 1, line.to_string()));
        }
    }
    out
}

fn forbid(dir: &Path, patterns: &[&str], what: &str) {
    let violations: Vec<String> = production_lines(dir)
        .into_iter()
        .filter(|(_, _, line)| patterns.iter().any(|p| line.contains(p)))
        .map(|(rel, n, line)| format!("{rel}:{n}: {}", line.trim()))
        .collect();
    assert!(violations.is_empty(), "{what}:\n{}", violations.join("\n"));
}

#[test]
fn domain_is_pure() {
    forbid(
        &src_dir().join("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
        "domain/ must stay free of I/O and outer layers",
    );
}

#[test]
fn application_has_no_infra_or_output_imports() {
    forbid(
        &src_dir().join("application"),
        &["crate::infra", "crate::output", "crate::commands", "crate::app::"],
        "application/ must only depend on domain/ and its own ports",
    );
}

#[test]
fn application_has_no_direct_io() {
    forbid(
        &src_dir().join("application"),
        &["std::fs::", "std::process::Command", "tokio::process", "std::net::"],
        "application/ must reach the host through ports",
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    forbid(
        &src_dir().join("infra"),
        &["crate::commands", "crate::output"],
        "infra/ must not import from commands/ or output/",
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    forbid(
        &src_dir().join("infra"),
        &["println!", "eprintln!", "print!("],
        "infra/ must not print outside #[cfg(test)]",
    );
}

#[test]
fn no_inline_json_branching_in_commands() {
    let violations: Vec<String> = production_lines(&src_dir().join("commands"))
        .into_iter()
        .filter(|(_, _, line)| {
            let trimmed = line.trim();
            line.contains("json: bool")
                || trimmed.starts_with("if json")
                || trimmed.starts_with("if !json")
                || line.contains("serde_json::")
        })
        .map(|(rel, n, line)| format!("{rel}:{n}: {}", line.trim()))
        .collect();
    assert!(
        violations.is_empty(),
        "commands/ must render through app.renderer():\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_use_standardized_confirmation() {
    forbid(
        &src_dir().join("commands"),
        &["Confirm::new()", "stdin().lock()"],
        "commands/ must prompt through app.confirm()",
    );
}

#[test]
fn no_tokio_command_runner_new_outside_infra() {
    let violations: Vec<String> = production_lines(&src_dir())
        .into_iter()
        .filter(|(rel, _, _)| !rel.contains("/infra/") && !rel.ends_with("app.rs"))
        .filter(|(_, _, line)| line.contains("TokioCommandRunner::new"))
        .map(|(rel, n, line)| format!("{rel}:{n}: {}", line.trim()))
        .collect();
    assert!(
        violations.is_empty(),
        "the command runner is built once in AppContext:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_module_level_dead_code_allows_in_layers() {
    for layer in ["domain", "application", "infra"] {
        forbid(
            &src_dir().join(layer),
            &["#![allow(dead_code)]"],
            "module-level dead_code allows hide unused code",
        );
    }
}
