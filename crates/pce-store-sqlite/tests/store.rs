// crates/pce-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Durable roundtrips, restart survival, and cursor guarantees.
// ============================================================================
//! ## Overview
//! Validates snapshot and log roundtrips against a temporary database,
//! approvals surviving a close-and-reopen cycle, and strictly monotonic
//! gap-free transcript cursors.

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

use pce_core::CognitionStore;
use pce_core::core::ActionId;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::core::ApprovalRecord;
use pce_core::core::ApprovalStatus;
use pce_core::core::CciComponents;
use pce_core::core::CciSnapshot;
use pce_core::core::CompletedAction;
use pce_core::core::ComponentValue;
use pce_core::core::CorrelationId;
use pce_core::core::DecisionId;
use pce_core::core::EventId;
use pce_core::core::EventPayload;
use pce_core::core::NormalizedEvent;
use pce_core::core::StateSnapshot;
use pce_core::core::Timestamp;
use pce_core::core::TranscriptEntry;
use pce_core::core::TranscriptKind;
use pce_store_sqlite::SqliteCognitionStore;
use pce_store_sqlite::SqliteStoreConfig;
use serde_json::json;
use tempfile::TempDir;

/// Opens a store inside a fresh temporary directory.
fn open_store(dir: &TempDir) -> SqliteCognitionStore {
    SqliteCognitionStore::new(&SqliteStoreConfig::at(dir.path().join("pce_state.db"))).unwrap()
}

/// Builds a completed action at the given timestamp.
fn action(ts: i64) -> CompletedAction {
    CompletedAction {
        action_id: ActionId::random(),
        decision_id: DecisionId::random(),
        plan: ActionPlan {
            action_type: "observe".to_string(),
            domain: "assistant".to_string(),
            priority: 2,
            rationale: "test".to_string(),
            expected_impact: 0.6,
            requires_approval: false,
            metadata: ActionMetadata::default(),
        },
        observed_impact: 0.6,
        success: true,
        violations: Vec::new(),
        completed_at: Timestamp::from_millis(ts),
    }
}

/// Verifies state snapshots round-trip through the database.
#[test]
fn state_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut state = StateSnapshot::new();
    state.set("marker", json!({ "hello": "world" }));
    store.save_state(&state).unwrap();
    assert_eq!(store.load_state().unwrap(), state);

    state.set("marker", json!({ "hello": "again" }));
    store.save_state(&state).unwrap();
    assert_eq!(store.load_state().unwrap(), state);
}

/// Verifies events append and actions return oldest-first within the limit.
#[test]
fn action_log_orders_oldest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for ts in [30, 10, 20] {
        store.append_action(&action(ts)).unwrap();
    }
    let recent = store.recent_actions(2).unwrap();
    let stamps: Vec<i64> = recent.iter().map(|a| a.completed_at.as_millis()).collect();
    assert_eq!(stamps, vec![20, 30]);
}

/// Verifies normalized events persist with their stamps.
#[test]
fn event_log_appends() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let event = NormalizedEvent {
        event_id: EventId::random(),
        event_type: "budget.updated".to_string(),
        source: "sim".to_string(),
        ts: Timestamp::from_millis(5),
        payload: EventPayload { domain: "os.robotics".to_string(), ..EventPayload::default() },
    };
    store.append_event(&event).unwrap();
}

/// Verifies coherence snapshots round-trip oldest-first.
#[test]
fn cci_history_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for (ts, value) in [(1, 0.5), (2, 0.7), (3, 0.9)] {
        store
            .append_cci(&CciSnapshot {
                ts: Timestamp::from_millis(ts),
                cci: value,
                components: CciComponents {
                    consistency: ComponentValue::Known(1.0),
                    stability: ComponentValue::Known(1.0),
                    contradiction_rate: ComponentValue::Known(0.0),
                    predictive_accuracy: ComponentValue::Known(1.0),
                },
            })
            .unwrap();
    }
    let history = store.cci_history(2).unwrap();
    let values: Vec<f64> = history.iter().map(|s| s.cci).collect();
    assert_eq!(values, vec![0.7, 0.9]);
}

/// Verifies pending approvals survive a close-and-reopen cycle.
#[test]
fn approvals_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let record = ApprovalRecord {
        approval_id: pce_core::core::ApprovalId::new("approval-1"),
        decision_id: DecisionId::new("decision-1"),
        status: ApprovalStatus::Pending,
        action: ActionPlan {
            action_type: "purchase".to_string(),
            domain: "os.robotics".to_string(),
            priority: 5,
            rationale: "buy".to_string(),
            expected_impact: 0.7,
            requires_approval: true,
            metadata: ActionMetadata::default(),
        },
        projected_cost: 240.0,
        risk: "MEDIUM".to_string(),
        rationale: "buy".to_string(),
        correlation_id: Some(CorrelationId::new("c1")),
        created_at: Timestamp::from_millis(1),
        resolved_at: None,
        actor: None,
        notes: None,
        override_applied: false,
    };

    {
        let store = open_store(&dir);
        store.put_approval(&record).unwrap();
    }
    let store = open_store(&dir);
    let loaded = store.approval(&record.approval_id).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.status, ApprovalStatus::Pending);
}

/// Verifies updating an approval replaces the stored status.
#[test]
fn approval_update_replaces_status() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut record = ApprovalRecord {
        approval_id: pce_core::core::ApprovalId::new("approval-1"),
        decision_id: DecisionId::new("decision-1"),
        status: ApprovalStatus::Pending,
        action: ActionPlan::observe("os.robotics", "x"),
        projected_cost: 0.0,
        risk: "LOW".to_string(),
        rationale: "x".to_string(),
        correlation_id: None,
        created_at: Timestamp::from_millis(1),
        resolved_at: None,
        actor: None,
        notes: None,
        override_applied: false,
    };
    store.put_approval(&record).unwrap();

    record.status = ApprovalStatus::Expired;
    record.resolved_at = Some(Timestamp::from_millis(2));
    store.put_approval(&record).unwrap();

    let loaded = store.approval(&record.approval_id).unwrap().unwrap();
    assert_eq!(loaded.status, ApprovalStatus::Expired);
    assert_eq!(store.approvals().unwrap().len(), 1);
}

/// Verifies transcript cursors are strictly monotonic and gap-free, and
/// catch-up returns only strictly newer items.
#[test]
fn transcript_cursor_guarantees() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut cursors = Vec::new();
    for index in 0..15 {
        let item = store
            .append_transcript(&TranscriptEntry {
                ts: Timestamp::from_millis(index),
                kind: TranscriptKind::EventIngested,
                agent: None,
                payload: json!({ "index": index }),
                correlation_id: CorrelationId::new("c1"),
                decision_id: None,
            })
            .unwrap();
        cursors.push(item.cursor);
    }
    for window in cursors.windows(2) {
        assert_eq!(window[1], window[0] + 1);
    }
    assert_eq!(store.latest_cursor().unwrap(), 15);

    let items = store.transcript_since(10, 100).unwrap();
    let tail: Vec<u64> = items.iter().map(|item| item.cursor).collect();
    assert_eq!(tail, vec![11, 12, 13, 14, 15]);
    assert_eq!(items[0].kind, TranscriptKind::EventIngested);
}
