// crates/pce-core/tests/coherence.rs
// ============================================================================
// Module: Coherence Engine Tests
// Description: Tests for the four-component coherence index.
// ============================================================================
//! ## Overview
//! Validates the cold-start floor, the component arithmetic, the fixed
//! weights, and window trimming over the completed action log.

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

use pce_core::CoherenceEngine;
use pce_core::core::ActionId;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::core::CompletedAction;
use pce_core::core::ComponentValue;
use pce_core::core::DecisionId;
use pce_core::core::Timestamp;

/// Builds a completed action with the given shape.
fn action(
    priority: i64,
    expected: f64,
    observed: f64,
    violations: &[&str],
    ts: i64,
) -> CompletedAction {
    CompletedAction {
        action_id: ActionId::random(),
        decision_id: DecisionId::random(),
        plan: ActionPlan {
            action_type: "observe".to_string(),
            domain: "assistant".to_string(),
            priority,
            rationale: "test".to_string(),
            expected_impact: expected,
            requires_approval: false,
            metadata: ActionMetadata::default(),
        },
        observed_impact: observed,
        success: true,
        violations: violations.iter().map(ToString::to_string).collect(),
        completed_at: Timestamp::from_millis(ts),
    }
}

/// Verifies fewer than three qualifying actions yields 0.5 with unknowns.
#[test]
fn cold_start_returns_half_with_unknown_components() {
    let engine = CoherenceEngine::default();
    let now = Timestamp::from_millis(1_000);

    for count in 0..3 {
        let log: Vec<_> =
            (0..count).map(|i| action(2, 0.6, 0.6, &[], i64::from(i))).collect();
        let snapshot = engine.compute(&log, now);
        assert!((snapshot.cci - 0.5).abs() < f64::EPSILON, "count {count}");
        assert!(snapshot.components.consistency.value().is_none());
        assert!(snapshot.components.stability.value().is_none());
        assert!(snapshot.components.contradiction_rate.value().is_none());
        assert!(snapshot.components.predictive_accuracy.value().is_none());
    }
}

/// Verifies three clean, accurate actions push the index well past 0.7.
#[test]
fn clean_accurate_actions_exceed_seven_tenths() {
    let engine = CoherenceEngine::default();
    let log = vec![
        action(2, 0.6, 0.65, &[], 1),
        action(2, 0.7, 0.62, &[], 2),
        action(2, 0.5, 0.55, &[], 3),
    ];
    let snapshot = engine.compute(&log, Timestamp::from_millis(10));
    assert!(snapshot.cci > 0.7, "cci was {}", snapshot.cci);
    assert_eq!(snapshot.components.consistency, ComponentValue::Known(1.0));
    assert_eq!(snapshot.components.contradiction_rate, ComponentValue::Known(0.0));
}

/// Verifies violations raise the contradiction rate and lower the index.
#[test]
fn violations_lower_the_index() {
    let engine = CoherenceEngine::default();
    let clean = vec![
        action(2, 0.6, 0.6, &[], 1),
        action(2, 0.6, 0.6, &[], 2),
        action(2, 0.6, 0.6, &[], 3),
        action(2, 0.6, 0.6, &[], 4),
    ];
    let tainted = vec![
        action(2, 0.6, 0.6, &[], 1),
        action(2, 0.6, 0.6, &["budget_negative"], 2),
        action(2, 0.6, 0.6, &["tag_conflict"], 3),
        action(2, 0.6, 0.6, &[], 4),
    ];
    let now = Timestamp::from_millis(10);
    let clean_cci = engine.compute(&clean, now).cci;
    let tainted_cci = engine.compute(&tainted, now).cci;
    assert!(tainted_cci < clean_cci);

    let components = engine.compute(&tainted, now).components;
    assert_eq!(components.contradiction_rate, ComponentValue::Known(0.5));
    assert_eq!(components.consistency, ComponentValue::Known(0.5));
}

/// Verifies priority churn lowers the stability component.
#[test]
fn priority_variance_lowers_stability() {
    let engine = CoherenceEngine::default();
    let steady = vec![
        action(3, 0.6, 0.6, &[], 1),
        action(3, 0.6, 0.6, &[], 2),
        action(3, 0.6, 0.6, &[], 3),
        action(3, 0.6, 0.6, &[], 4),
    ];
    let churning = vec![
        action(0, 0.6, 0.6, &[], 1),
        action(10, 0.6, 0.6, &[], 2),
        action(0, 0.6, 0.6, &[], 3),
        action(10, 0.6, 0.6, &[], 4),
    ];
    let now = Timestamp::from_millis(10);
    let steady_stability = engine.compute(&steady, now).components.stability.value().unwrap();
    let churn_stability = engine.compute(&churning, now).components.stability.value().unwrap();
    assert!((steady_stability - 1.0).abs() < f64::EPSILON);
    assert!((churn_stability - 0.0).abs() < f64::EPSILON);
}

/// Verifies prediction error degrades predictive accuracy.
#[test]
fn prediction_error_degrades_accuracy() {
    let engine = CoherenceEngine::default();
    let log = vec![
        action(2, 1.0, 0.0, &[], 1),
        action(2, 0.0, 1.0, &[], 2),
        action(2, 1.0, 0.0, &[], 3),
    ];
    let accuracy =
        engine.compute(&log, Timestamp::from_millis(10)).components.predictive_accuracy;
    assert_eq!(accuracy, ComponentValue::Known(0.0));
}

/// Verifies actions outside the window are ignored.
#[test]
fn window_trims_old_actions() {
    let engine = CoherenceEngine::new(3, pce_core::CciWeights::default());
    let mut log: Vec<_> = (0..10)
        .map(|i| action(2, 0.6, 0.6, &["budget_negative"], i))
        .collect();
    log.extend((10..13).map(|i| action(2, 0.6, 0.6, &[], i)));

    let snapshot = engine.compute(&log, Timestamp::from_millis(100));
    assert_eq!(snapshot.components.contradiction_rate, ComponentValue::Known(0.0));
}
