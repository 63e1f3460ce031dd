//! Sleep Prohibition
//!
//! **Policy**: Neither the panel nor its tests may sleep. Production code
//! waits on channels and futures; tests drive scripted backends and
//! in-process sockets, so every wait is on an event that will happen.

use architectural_enforcement::{assert_none, scan};

fn sleeps(code: &str) -> bool {
    code.contains("sleep(") || code.contains("std::thread::sleep")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(&["panel/core/src", "panel/cli/src"], true, &[], sleeps);
    assert_none(
        &violations,
        "sleep() in production code",
        "Wait on a channel, a future or tokio::time::timeout instead",
    );
}

#[test]
fn test_no_sleep_in_integration_tests() {
    let violations = scan(&["panel/core/tests"], false, &[], sleeps);
    assert_none(
        &violations,
        "sleep() in integration tests",
        "Script the backend so the awaited event is already queued",
    );
}
