//! Architectural Enforcement Helpers
//!
//! Source scanning shared by the enforcement tests in `tests/`:
//! - No sleeping anywhere in the panel or its tests
//! - No blocking I/O in async code paths
//! - No panicking shortcuts in production code
//!
//! "Production code" is everything in a file before its first
//! `#[cfg(test)]`, with line comments stripped.

use std::fs;
use std::path::{Path, PathBuf};

/// A forbidden pattern found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File, relative to the workspace root
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending code
    pub code: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.code.trim())
    }
}

/// Workspace root (two levels above this package)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Code part of a line: everything before a `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Numbered code lines of a file, optionally stopping at the test module
#[must_use]
pub fn code_lines(content: &str, production_only: bool) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if production_only && line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }
        lines.push((idx + 1, code_part(line)));
    }
    lines
}

/// Scan every file under `dirs` for lines matching `forbidden`
///
/// `allow` exempts whole files by path suffix (e.g. `config/mod.rs`).
pub fn scan<F>(dirs: &[&str], production_only: bool, allow: &[&str], forbidden: F) -> Vec<Violation>
where
    F: Fn(&str) -> bool,
{
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in dirs {
        for path in rust_files(dir) {
            if allow.iter().any(|suffix| path.ends_with(suffix)) {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line, code) in code_lines(&content, production_only) {
                if forbidden(code) {
                    violations.push(Violation {
                        path: path.strip_prefix(&root).unwrap_or(&path).to_path_buf(),
                        line,
                        code: code.to_string(),
                    });
                }
            }
        }
    }

    violations
}

/// Fail with a readable report if anything was found
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn assert_none(violations: &[Violation], rule: &str, fix: &str) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n✅ {fix}");
    panic!("\nFound {} violation(s): {rule}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_lines_stop_at_test_module() {
        let src = "fn a() {}\n// x.unwrap()\n#[cfg(test)]\nmod tests {}\n";
        let lines = code_lines(src, true);
        assert_eq!(lines, vec![(1, "fn a() {}"), (2, "")]);
        assert_eq!(code_lines(src, false).len(), 4);
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }
}
