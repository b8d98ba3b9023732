// crates/pce-core/tests/adaptation.rs
// ============================================================================
// Module: Adaptation Helper Tests
// Description: Tests for session memory bounds and Q-learning primitives.
// ============================================================================
//! ## Overview
//! Validates FIFO-bounded session memory, the tabular Q-update, greedy action
//! selection, and monotonic epsilon decay.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use pce_core::runtime::SESSION_MEMORY_CAP;
use pce_core::runtime::decay_epsilon;
use pce_core::runtime::greedy_action;
use pce_core::runtime::q_update;
use pce_core::runtime::remember;

/// Verifies session notes evict oldest-first at the cap.
#[test]
fn remember_caps_with_fifo_eviction() {
    let mut notes = Vec::new();
    for index in 0..(SESSION_MEMORY_CAP + 5) {
        remember(&mut notes, format!("note-{index}"));
    }
    assert_eq!(notes.len(), SESSION_MEMORY_CAP);
    assert_eq!(notes.first().map(String::as_str), Some("note-5"));
    assert_eq!(
        notes.last().map(String::as_str),
        Some(format!("note-{}", SESSION_MEMORY_CAP + 4).as_str())
    );
}

/// Verifies the Q-update moves the cell toward the bootstrapped target.
#[test]
fn q_update_moves_toward_target() {
    let mut q: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    q.entry("s2".to_string()).or_default().insert("FWD".to_string(), 2.0);

    q_update(&mut q, "s1", "FWD", 1.0, "s2", 0.2, 0.95);

    // Target is r + gamma * max_a' Q(s2) = 1 + 0.95 * 2 = 2.9; step 0.2 from 0.
    let cell = q["s1"]["FWD"];
    assert!((cell - 0.58).abs() < 1e-9, "cell was {cell}");
}

/// Verifies greedy selection prefers the highest-valued action.
#[test]
fn greedy_action_prefers_highest_value() {
    let mut q: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let row = q.entry("s1".to_string()).or_default();
    row.insert("FWD".to_string(), 0.4);
    row.insert("L".to_string(), 0.9);
    row.insert("S".to_string(), 0.1);

    assert_eq!(greedy_action(&q, "s1").as_deref(), Some("L"));
    assert_eq!(greedy_action(&q, "unknown"), None);
}

/// Verifies epsilon decays monotonically and never below the floor.
#[test]
fn epsilon_decays_monotonically_to_floor() {
    let mut epsilon = 1.0;
    let mut previous = epsilon;
    for _ in 0..100_000 {
        epsilon = decay_epsilon(epsilon, 0.9995, 0.05);
        assert!(epsilon <= previous);
        previous = epsilon;
    }
    assert!((epsilon - 0.05).abs() < f64::EPSILON);
}
