//! Panic Prohibition
//!
//! **Policy**: Production code propagates errors; `unwrap()` and `expect()`
//! are for tests only. A panic in the reader task would silently end every
//! open subscription.

use architectural_enforcement::{assert_none, scan};

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = scan(&["panel/core/src", "panel/cli/src"], true, &[], |code| {
        code.contains(".unwrap()") || code.contains(".expect(")
    });
    assert_none(
        &violations,
        "unwrap()/expect() in production code",
        "Return a Result with ? or handle the None/Err case",
    );
}
