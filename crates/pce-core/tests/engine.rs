// crates/pce-core/tests/engine.rs
// ============================================================================
// Module: Pipeline Engine Tests
// Description: End-to-end pipeline tests over the in-memory store.
// ============================================================================
//! ## Overview
//! Drives full pipeline invocations with small test plugins: exactly one
//! response per event, at most one completed action and one pending approval,
//! gated plans leaving the twin untouched, terminal approvals applying the
//! synthesized completion, and plugin failures downgrading to the core
//! default.

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

use async_trait::async_trait;
use pce_core::ApprovalStatus;
use pce_core::CognitionEngine;
use pce_core::CognitionStore;
use pce_core::Decision;
use pce_core::DecisionInputs;
use pce_core::DecisionPlugin;
use pce_core::EngineError;
use pce_core::EngineSettings;
use pce_core::InMemoryCognitionStore;
use pce_core::MergeOutcome;
use pce_core::PluginError;
use pce_core::PluginRegistry;
use pce_core::SharedCognitionStore;
use pce_core::StateMerge;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::core::ApprovalResolution;
use pce_core::core::NormalizedEvent;
use pce_core::core::PceOsState;
use pce_core::core::StateSnapshot;
use pce_core::runtime::DomainPlugins;
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// SECTION: Test Plugins
// ============================================================================

/// Minimal twin merge: budget updates and purchase completions only.
struct TwinMerge;

impl StateMerge for TwinMerge {
    fn merge(&self, mut state: StateSnapshot, event: &NormalizedEvent) -> MergeOutcome {
        let mut os = state.pce_os();
        match event.event_type.as_str() {
            "budget.updated" => {
                let amount = event.payload.number_field("amount").unwrap_or(0.0);
                os.twin.budget_total = amount;
                os.twin.budget_remaining = amount;
                state.set_pce_os(&os);
            }
            "purchase.completed" => {
                let cost = event.payload.number_field("cost").unwrap_or(0.0);
                os.twin.budget_remaining -= cost;
                os.twin.purchase_history.push(pce_core::core::PurchaseEntry {
                    item: event.payload.string_field("item").unwrap_or("x").to_string(),
                    cost,
                    ts: event.ts,
                    approval_id: None,
                });
                state.set_pce_os(&os);
            }
            _ => {}
        }
        MergeOutcome { state, violations: Vec::new() }
    }
}

/// Deliberation that gates purchase requests and records everything else.
struct GatingDecide;

#[async_trait]
impl DecisionPlugin for GatingDecide {
    async fn decide(
        &self,
        state: StateSnapshot,
        inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError> {
        let plan = if inputs.event.event_type == "purchase.requested" {
            ActionPlan {
                action_type: "purchase".to_string(),
                domain: "os.robotics".to_string(),
                priority: 5,
                rationale: "gated purchase".to_string(),
                expected_impact: 0.7,
                requires_approval: true,
                metadata: ActionMetadata {
                    risk: inputs.event.payload.string_field("risk_level").map(ToString::to_string),
                    projected_cost: inputs.event.payload.number_field("projected_cost"),
                    subject: inputs.event.payload.string_field("item").map(ToString::to_string),
                    ..ActionMetadata::default()
                },
            }
        } else {
            ActionPlan::observe("os.robotics", "twin bookkeeping")
        };
        Ok(Decision { state, plan })
    }
}

/// Deliberation that always fails.
struct FailingDecide;

#[async_trait]
impl DecisionPlugin for FailingDecide {
    async fn decide(
        &self,
        _state: StateSnapshot,
        _inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError> {
        Err(PluginError::Failure("boom".to_string()))
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds an engine plus store handle with the gating test plugins.
fn gated_engine() -> (CognitionEngine, InMemoryCognitionStore) {
    let store = InMemoryCognitionStore::new();
    let mut registry = PluginRegistry::new();
    registry.register(
        "os.robotics",
        DomainPlugins::new()
            .with_merge(Arc::new(TwinMerge))
            .with_decide(Arc::new(GatingDecide)),
    );
    let engine = CognitionEngine::new(
        SharedCognitionStore::from_store(store.clone()),
        registry,
        EngineSettings::default(),
    );
    (engine, store)
}

/// Builds a purchase request envelope.
fn purchase_request(cost: f64, risk: &str) -> serde_json::Value {
    json!({
        "event_type": "purchase.requested",
        "source": "sim",
        "payload": {
            "domain": "os.robotics",
            "correlation_id": "c1",
            "item": "servo",
            "projected_cost": cost,
            "risk_level": risk
        }
    })
}

/// Builds a budget update envelope.
fn budget_update(amount: f64) -> serde_json::Value {
    json!({
        "event_type": "budget.updated",
        "source": "sim",
        "payload": { "domain": "os.robotics", "amount": amount }
    })
}

// ============================================================================
// SECTION: Pipeline Invariants
// ============================================================================

/// Verifies one event produces one response, one action, no approvals.
#[tokio::test]
async fn plain_event_completes_one_action() {
    let (engine, store) = gated_engine();
    let response = engine.ingest(&budget_update(500.0)).await.unwrap();

    assert_eq!(response.action_type, "observe");
    assert!(response.success);
    assert!(response.requires_approval.is_none());
    assert_eq!(store.recent_actions(100).unwrap().len(), 1);
    assert!(store.approvals().unwrap().is_empty());

    let state = engine.state().unwrap();
    assert!((state.pce_os().twin.budget_remaining - 500.0).abs() < f64::EPSILON);
    assert_eq!(state.ring("event_history").len(), 1);
}

/// Verifies an unregistered domain falls back to the core observe default.
#[tokio::test]
async fn unregistered_domain_uses_core_default() {
    let (engine, store) = gated_engine();
    let envelope = json!({
        "event_type": "market_signal",
        "source": "feed",
        "payload": { "domain": "trader", "symbol": "BTC", "signal": 0.4 }
    });
    let response = engine.ingest(&envelope).await.unwrap();
    assert_eq!(response.action_type, "observe");
    assert_eq!(store.recent_actions(100).unwrap().len(), 1);
}

/// Verifies invalid envelopes produce no pipeline side effects.
#[tokio::test]
async fn invalid_event_has_no_side_effects() {
    let (engine, store) = gated_engine();
    let error = engine.ingest(&json!({ "source": "sim" })).await.unwrap_err();
    assert!(matches!(error, EngineError::InvalidEvent(_)));
    assert!(store.recent_actions(100).unwrap().is_empty());
    assert_eq!(store.latest_cursor().unwrap(), 0);
}

/// Verifies transcript cursors grow monotonically across pipeline runs.
#[tokio::test]
async fn transcript_cursors_monotonic_across_events() {
    let (engine, store) = gated_engine();
    for _ in 0..3 {
        engine.ingest(&budget_update(500.0)).await.unwrap();
    }
    let items = store.transcript_since(0, 1_000).unwrap();
    assert!(!items.is_empty());
    for window in items.windows(2) {
        assert_eq!(window[1].cursor, window[0].cursor + 1);
    }
}

// ============================================================================
// SECTION: Approval Path
// ============================================================================

/// Verifies a gated plan suspends with the twin untouched.
#[tokio::test]
async fn gated_plan_suspends_without_twin_change() {
    let (engine, store) = gated_engine();
    engine.ingest(&budget_update(500.0)).await.unwrap();

    let response = engine.ingest(&purchase_request(240.0, "MEDIUM")).await.unwrap();
    assert_eq!(response.requires_approval, Some(true));
    assert!(response.approval_id.is_some());
    assert_eq!(response.action.get("status").and_then(|v| v.as_str()), Some("pending"));

    let state = engine.state().unwrap();
    assert!((state.pce_os().twin.budget_remaining - 500.0).abs() < f64::EPSILON);
    assert!(state.pce_os().twin.purchase_history.is_empty());

    let approvals = store.approvals().unwrap();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].status, ApprovalStatus::Pending);
}

/// Verifies approval applies the synthesized completion to the twin.
#[tokio::test]
async fn approve_debits_budget_through_followup() {
    let (engine, _store) = gated_engine();
    engine.ingest(&budget_update(500.0)).await.unwrap();
    let response = engine.ingest(&purchase_request(240.0, "MEDIUM")).await.unwrap();
    let approval_id = response.approval_id.unwrap();

    let outcome = engine
        .resolve_approval(
            &approval_id,
            ApprovalResolution::Approve { actor: "op".to_string(), notes: "ok".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(outcome.approval.status, ApprovalStatus::Approved);
    assert!(outcome.followup.is_some());

    let state = engine.state().unwrap();
    assert!((state.pce_os().twin.budget_remaining - 260.0).abs() < f64::EPSILON);
    assert_eq!(state.pce_os().twin.purchase_history.len(), 1);
}

/// Verifies rejection synthesizes an audit-only follow-up.
#[tokio::test]
async fn reject_leaves_budget_unchanged() {
    let (engine, _store) = gated_engine();
    engine.ingest(&budget_update(500.0)).await.unwrap();
    let response = engine.ingest(&purchase_request(240.0, "MEDIUM")).await.unwrap();
    let approval_id = response.approval_id.unwrap();

    let outcome = engine
        .resolve_approval(
            &approval_id,
            ApprovalResolution::Reject { actor: "op".to_string(), reason: "no".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(outcome.approval.status, ApprovalStatus::Rejected);

    let state = engine.state().unwrap();
    assert!((state.pce_os().twin.budget_remaining - 500.0).abs() < f64::EPSILON);
    assert!(state.pce_os().twin.purchase_history.is_empty());
}

/// Verifies insufficient budget keeps the approval pending.
#[tokio::test]
async fn insufficient_budget_blocks_approval() {
    let (engine, store) = gated_engine();
    engine.ingest(&budget_update(100.0)).await.unwrap();
    let response = engine.ingest(&purchase_request(240.0, "MEDIUM")).await.unwrap();
    let approval_id = response.approval_id.unwrap();

    let error = engine
        .resolve_approval(
            &approval_id,
            ApprovalResolution::Approve { actor: "op".to_string(), notes: "ok".to_string() },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        EngineError::Gate(pce_core::GateError::InsufficientBudget { .. })
    ));

    let approvals = store.approvals().unwrap();
    assert_eq!(approvals[0].status, ApprovalStatus::Pending);
    let state = engine.state().unwrap();
    assert!((state.pce_os().twin.budget_remaining - 100.0).abs() < f64::EPSILON);
}

// ============================================================================
// SECTION: Failure Semantics
// ============================================================================

/// Verifies a failing plugin downgrades to the core default plan.
#[tokio::test]
async fn plugin_error_downgrades_to_observe() {
    let store = InMemoryCognitionStore::new();
    let mut registry = PluginRegistry::new();
    registry.register("trader", DomainPlugins::new().with_decide(Arc::new(FailingDecide)));
    let engine = CognitionEngine::new(
        SharedCognitionStore::from_store(store),
        registry,
        EngineSettings::default(),
    );

    let envelope = json!({
        "event_type": "market_signal",
        "source": "feed",
        "payload": { "domain": "trader", "symbol": "BTC", "signal": 0.4 }
    });
    let response = engine.ingest(&envelope).await.unwrap();
    assert_eq!(response.action_type, "observe");
    assert_eq!(
        response.metadata.de_entry("override_reason").and_then(|v| v.as_str()),
        Some("plugin_error")
    );
}

/// Verifies OS metrics count events, actions, and approvals.
#[tokio::test]
async fn metrics_track_pipeline_activity() {
    let (engine, _store) = gated_engine();
    engine.ingest(&budget_update(500.0)).await.unwrap();
    engine.ingest(&purchase_request(240.0, "MEDIUM")).await.unwrap();

    let os: PceOsState = engine.state().unwrap().pce_os();
    assert_eq!(os.metrics.events_processed, 2);
    assert_eq!(os.metrics.actions_completed, 1);
    assert_eq!(os.metrics.approvals_created, 1);
}
