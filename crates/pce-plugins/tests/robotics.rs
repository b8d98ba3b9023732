// crates/pce-plugins/tests/robotics.rs
// ============================================================================
// Module: Robotics Plugin Tests
// Description: Tests for twin merges, cycle handling, and the rover policy.
// ============================================================================
//! ## Overview
//! Validates the twin merge rules (pending purchases never touch the twin,
//! completions debit it), bill-of-materials cycle dropping, and the rover
//! tabular Q adaptation path.

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

use pce_core::AdaptPlugin;
use pce_core::DecisionInputs;
use pce_core::DecisionPlugin;
use pce_core::StateMerge;
use pce_core::core::CciComponents;
use pce_core::core::CciSnapshot;
use pce_core::core::EventPayload;
use pce_core::core::NormalizedEvent;
use pce_core::core::StateSnapshot;
use pce_core::core::Timestamp;
use pce_core::core::identifiers::EventId;
use pce_plugins::RoboticsPlugin;
use serde_json::Value;
use serde_json::json;

/// Builds a normalized robotics event of the given type.
fn event(event_type: &str, extra: Value) -> NormalizedEvent {
    let mut payload_extra = serde_json::Map::new();
    if let Value::Object(map) = extra {
        payload_extra = map;
    }
    NormalizedEvent {
        event_id: EventId::random(),
        event_type: event_type.to_string(),
        source: "test".to_string(),
        ts: Timestamp::from_millis(1_000),
        payload: EventPayload {
            domain: "os.robotics".to_string(),
            session_id: None,
            correlation_id: None,
            tags: std::collections::BTreeSet::new(),
            extra: payload_extra,
        },
    }
}

/// Builds a healthy coherence snapshot.
fn cci(value: f64) -> CciSnapshot {
    CciSnapshot {
        ts: Timestamp::from_millis(1_000),
        cci: value,
        components: CciComponents::all_unknown(),
    }
}

/// Verifies budget updates set both totals.
#[test]
fn budget_update_sets_twin_budget() {
    let plugin = RoboticsPlugin::new();
    let outcome =
        plugin.merge(StateSnapshot::new(), &event("budget.updated", json!({ "amount": 500.0 })));
    let twin = outcome.state.pce_os().twin;
    assert!((twin.budget_total - 500.0).abs() < f64::EPSILON);
    assert!((twin.budget_remaining - 500.0).abs() < f64::EPSILON);
    assert!(outcome.violations.is_empty());
}

/// Verifies negative budgets clamp with a violation tag.
#[test]
fn negative_budget_clamps_with_violation() {
    let plugin = RoboticsPlugin::new();
    let outcome =
        plugin.merge(StateSnapshot::new(), &event("budget.updated", json!({ "amount": -50.0 })));
    assert!(outcome.violations.contains(&"budget_clamped".to_string()));
    assert!(outcome.state.pce_os().twin.budget_remaining.abs() < f64::EPSILON);
}

/// Verifies a purchase request leaves the twin byte-for-byte untouched.
#[test]
fn purchase_request_never_touches_twin() {
    let plugin = RoboticsPlugin::new();
    let seeded = plugin
        .merge(StateSnapshot::new(), &event("budget.updated", json!({ "amount": 500.0 })))
        .state;
    let before = seeded.pce_os();

    let outcome = plugin.merge(
        seeded,
        &event(
            "purchase.requested",
            json!({ "item": "servo", "projected_cost": 240.0, "risk_level": "MEDIUM" }),
        ),
    );
    assert_eq!(outcome.state.pce_os(), before);
    assert!(outcome.violations.is_empty());
}

/// Verifies a completion debits the budget and appends history.
#[test]
fn purchase_completed_debits_and_records() {
    let plugin = RoboticsPlugin::new();
    let seeded = plugin
        .merge(StateSnapshot::new(), &event("budget.updated", json!({ "amount": 500.0 })))
        .state;

    let outcome = plugin.merge(
        seeded,
        &event(
            "purchase.completed",
            json!({ "item": "servo", "cost": 240.0, "approval_id": "approval-1" }),
        ),
    );
    let twin = outcome.state.pce_os().twin;
    assert!((twin.budget_remaining - 260.0).abs() < f64::EPSILON);
    assert_eq!(twin.purchase_history.len(), 1);
    assert_eq!(twin.purchase_history[0].item, "servo");
}

/// Verifies a dependency cycle is dropped and flagged.
#[test]
fn bom_cycle_is_dropped_and_flagged() {
    let plugin = RoboticsPlugin::new();
    let mut state = StateSnapshot::new();
    for (part, deps) in [("a", json!(["b"])), ("b", json!(["c"])), ("c", json!([]))] {
        state = plugin
            .merge(
                state,
                &event(
                    "part.candidate.added",
                    json!({ "part_id": part, "cost": 10.0, "depends_on": deps }),
                ),
            )
            .state;
    }

    // Re-adding c with a dependency on a closes the a -> b -> c -> a loop.
    let outcome = plugin.merge(
        state,
        &event(
            "part.candidate.added",
            json!({ "part_id": "c", "cost": 10.0, "depends_on": ["a"] }),
        ),
    );
    assert!(outcome.violations.contains(&"bom_cycle".to_string()));
    let components = outcome.state.pce_os().twin.components;
    assert!(components.get("c").unwrap().depends_on.is_empty());
}

/// Verifies purchase requests deliberate into a gated plan.
#[tokio::test]
async fn purchase_request_plans_gated_action() {
    let plugin = RoboticsPlugin::new();
    let request = event(
        "purchase.requested",
        json!({ "item": "servo", "projected_cost": 240.0, "risk_level": "HIGH" }),
    );
    let snapshot = cci(0.9);
    let inputs =
        DecisionInputs { value_score: 0.9, violations: &[], cci: &snapshot, event: &request };

    let decision = plugin.decide(StateSnapshot::new(), inputs).await.unwrap();
    assert_eq!(decision.plan.action_type, "purchase");
    assert!(decision.plan.requires_approval);
    assert_eq!(decision.plan.metadata.risk.as_deref(), Some("HIGH"));
    assert_eq!(decision.plan.metadata.projected_cost, Some(240.0));
    assert_eq!(decision.plan.metadata.subject.as_deref(), Some("servo"));
}

/// Verifies the rover idles when the loop is stopped.
#[tokio::test]
async fn stopped_rover_idles() {
    let plugin = RoboticsPlugin::new();
    let telemetry = event("robot_telemetry", json!({ "x": 2.0, "y": 3.0 }));
    let snapshot = cci(0.9);
    let inputs =
        DecisionInputs { value_score: 0.9, violations: &[], cci: &snapshot, event: &telemetry };

    let decision = plugin.decide(StateSnapshot::new(), inputs).await.unwrap();
    assert_eq!(decision.plan.action_type, "rover.idle");
}

/// Verifies a running rover plans a move and a low score forces a stop.
#[tokio::test]
async fn running_rover_moves_and_low_score_stops() {
    let plugin = RoboticsPlugin::new();
    let mut state = StateSnapshot::new();
    let mut robotics = state.robotics();
    robotics.rover.running = true;
    state.set_robotics(&robotics);

    let telemetry = event("robot_telemetry", json!({ "x": 2.0, "y": 3.0 }));
    let healthy = cci(0.9);
    let inputs =
        DecisionInputs { value_score: 0.9, violations: &[], cci: &healthy, event: &telemetry };
    let decision = plugin.decide(state.clone(), inputs).await.unwrap();
    assert_eq!(decision.plan.action_type, "rover.move");

    let inputs =
        DecisionInputs { value_score: 0.1, violations: &[], cci: &healthy, event: &telemetry };
    let decision = plugin.decide(state, inputs).await.unwrap();
    assert_eq!(
        decision.plan.metadata.de_entry("final_profile").and_then(Value::as_str),
        Some("S")
    );
    assert_eq!(
        decision.plan.metadata.de_entry("override_reason").and_then(Value::as_str),
        Some("value_floor")
    );
}

/// Verifies reward events update the Q table and episode stats.
#[test]
fn reward_updates_q_table_and_stats() {
    let plugin = RoboticsPlugin::new();
    let reward = event(
        "reward.rover.v1",
        json!({
            "reward": 5.0,
            "state": "cell_2_3",
            "action": "FWD",
            "next_state": "cell_3_3",
            "done": true
        }),
    );
    let state = plugin.adapt(StateSnapshot::new(), &reward).unwrap();
    let rover = state.robotics().rover;

    let cell = rover.q.get("cell_2_3").and_then(|row| row.get("FWD")).copied().unwrap();
    assert!((cell - 1.0).abs() < 1e-9, "cell was {cell}");
    assert_eq!(rover.stats.episodes, 1);
    assert!((rover.stats.total_reward - 5.0).abs() < f64::EPSILON);
    assert!(rover.epsilon < 1.0);
}
