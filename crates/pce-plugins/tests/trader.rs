// crates/pce-plugins/tests/trader.rs
// ============================================================================
// Module: Trader Plugin Tests
// Description: Tests for the macro/model/guardrails gate chain.
// ============================================================================
//! ## Overview
//! Validates the ordered gate chain: a bear macro regime blocks first, weak
//! signals hold, exposure guardrails block, and a clear chain executes.

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
use pce_plugins::TraderPlugin;
use serde_json::Value;
use serde_json::json;

/// Builds a normalized market signal event.
fn signal_event(extra: Value) -> NormalizedEvent {
    let mut payload_extra = serde_json::Map::new();
    if let Value::Object(map) = extra {
        payload_extra = map;
    }
    NormalizedEvent {
        event_id: EventId::random(),
        event_type: "market_signal".to_string(),
        source: "feed".to_string(),
        ts: Timestamp::from_millis(1_000),
        payload: EventPayload {
            domain: "trader".to_string(),
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

/// Merges a signal and deliberates in one step.
async fn decide_after(plugin: &TraderPlugin, extra: Value) -> pce_core::Decision {
    let event = signal_event(extra);
    let state = plugin.merge(StateSnapshot::new(), &event).state;
    let snapshot = cci(0.9);
    let inputs =
        DecisionInputs { value_score: 0.9, violations: &[], cci: &snapshot, event: &event };
    plugin.decide(state, inputs).await.unwrap()
}

/// Verifies a bear macro regime blocks the chain at MACRO.
#[tokio::test]
async fn bear_macro_blocks_first() {
    let plugin = TraderPlugin::new();
    let decision =
        decide_after(&plugin, json!({ "symbol": "BTC", "signal": 0.8, "bias": "bear" })).await;
    assert_eq!(decision.plan.action_type, "trade.hold");
    assert_eq!(
        decision.plan.metadata.de_entry("gate_blocked").and_then(Value::as_str),
        Some("MACRO")
    );
}

/// Verifies a weak signal holds at the MODEL gate.
#[tokio::test]
async fn weak_signal_holds_at_model_gate() {
    let plugin = TraderPlugin::new();
    let decision =
        decide_after(&plugin, json!({ "symbol": "BTC", "signal": 0.1, "bias": "bull" })).await;
    assert_eq!(decision.plan.action_type, "trade.hold");
    assert_eq!(
        decision.plan.metadata.de_entry("gate_blocked").and_then(Value::as_str),
        Some("MODEL")
    );
}

/// Verifies exposure past the guardrail ceiling blocks execution.
#[tokio::test]
async fn exposure_blocks_at_guardrails() {
    let plugin = TraderPlugin::new();
    let decision = decide_after(
        &plugin,
        json!({ "symbol": "BTC", "signal": 0.9, "bias": "bull", "exposure": 0.5 }),
    )
    .await;
    assert_eq!(decision.plan.action_type, "trade.hold");
    assert_eq!(
        decision.plan.metadata.de_entry("gate_blocked").and_then(Value::as_str),
        Some("GUARDRAILS")
    );
}

/// Verifies a clear chain executes a directional trade.
#[tokio::test]
async fn clear_chain_executes_trade() {
    let plugin = TraderPlugin::new();
    let buy =
        decide_after(&plugin, json!({ "symbol": "BTC", "signal": 0.8, "bias": "bull" })).await;
    assert_eq!(buy.plan.action_type, "trade.buy");
    assert_eq!(
        buy.plan.metadata.de_entry("final_profile").and_then(Value::as_str),
        Some("EXECUTE")
    );

    let sell =
        decide_after(&plugin, json!({ "symbol": "BTC", "signal": -0.8, "bias": "bull" })).await;
    assert_eq!(sell.plan.action_type, "trade.sell");
}

/// Verifies out-of-range signals clamp with a violation tag.
#[test]
fn out_of_range_signal_clamps() {
    let plugin = TraderPlugin::new();
    let event = signal_event(json!({ "symbol": "BTC", "signal": 3.0 }));
    let outcome = plugin.merge(StateSnapshot::new(), &event);
    assert!(outcome.violations.contains(&"signal_clamped".to_string()));
    assert!((outcome.state.trader().model_signal - 1.0).abs() < f64::EPSILON);
}

/// Verifies a low coherence index degrades the plan to hold.
#[tokio::test]
async fn low_cci_degrades_to_hold() {
    let plugin = TraderPlugin::new();
    let event = signal_event(json!({ "symbol": "BTC", "signal": 0.8, "bias": "bull" }));
    let state = plugin.merge(StateSnapshot::new(), &event).state;
    let snapshot = cci(0.2);
    let inputs =
        DecisionInputs { value_score: 0.9, violations: &[], cci: &snapshot, event: &event };
    let decision = plugin.decide(state, inputs).await.unwrap();
    assert_eq!(decision.plan.action_type, "trade.hold");
    assert_eq!(
        decision.plan.metadata.de_entry("override_reason").and_then(Value::as_str),
        Some("cci_floor")
    );
}
