//! Integration Test: Single-Loop Core
//!
//! Notification state is owned by one loop on one thread. The core library
//! must never start threads, block the loop by sleeping, or guard state
//! with locks; the daemon decides how long the loop waits.

use architectural_enforcement::{check_directory, core_source_dir, Rule};

const THREAD_RULES: &[Rule] = &[
    Rule {
        pattern: "thread::spawn",
        name: "Thread spawn",
    },
    Rule {
        pattern: "thread::Builder",
        name: "Thread builder",
    },
    Rule {
        pattern: "spawn_blocking",
        name: "Blocking task",
    },
];

const SLEEP_RULES: &[Rule] = &[Rule {
    pattern: "sleep(",
    name: "Sleep",
}];

const LOCK_RULES: &[Rule] = &[
    Rule {
        pattern: "Mutex",
        name: "Lock",
    },
    Rule {
        pattern: "RwLock",
        name: "Lock",
    },
    Rule {
        pattern: "block_on(",
        name: "Nested runtime",
    },
];

fn assert_clean(rules: &[Rule], advice: &str) {
    let violations = check_directory(&core_source_dir(), rules);
    if !violations.is_empty() {
        eprintln!("\n❌ Forbidden calls in notifyd/core/src:");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ {advice}");
        panic!("Found {} violation(s)", violations.len());
    }
}

#[test]
fn test_core_never_spawns_threads() {
    assert_clean(
        THREAD_RULES,
        "Do the work inside the loop iteration, or hand it to the daemon",
    );
}

#[test]
fn test_core_never_sleeps() {
    assert_clean(
        SLEEP_RULES,
        "Expiry is driven by tick(now); the daemon owns the bounded wait",
    );
}

#[test]
fn test_core_holds_no_locks() {
    assert_clean(
        LOCK_RULES,
        "State is touched from one loop only; pass &mut NotificationManager instead",
    );
}
