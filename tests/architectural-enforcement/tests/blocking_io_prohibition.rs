//! Blocking I/O Prohibition
//!
//! **Policy**: Production code runs on the tokio runtime and must not block
//! it. Use `tokio::net` and `tokio::io`, not `std::net` or blocking stdin.
//! The config loader is exempt: it reads one small file before the runtime
//! has any work.

use architectural_enforcement::{assert_none, scan};

const DIRS: &[&str] = &["panel/core/src", "panel/cli/src"];

#[test]
fn test_no_std_net() {
    let violations = scan(DIRS, true, &[], |code| code.contains("std::net::"));
    assert_none(
        &violations,
        "std::net in production code",
        "Use tokio::net::UnixStream",
    );
}

#[test]
fn test_std_fs_only_in_config_loader() {
    let violations = scan(DIRS, true, &["config/mod.rs"], |code| {
        code.contains("std::fs") || code.contains("File::open(")
    });
    assert_none(
        &violations,
        "std::fs outside the config loader",
        "Use tokio::fs, or move the read into config loading",
    );
}

#[test]
fn test_no_blocking_stdin() {
    let violations = scan(DIRS, true, &[], |code| {
        code.contains("std::io::stdin") || code.contains("read_line(")
    });
    assert_none(
        &violations,
        "Blocking stdin reads",
        "Use tokio::io::stdin() with AsyncBufReadExt::lines()",
    );
}
