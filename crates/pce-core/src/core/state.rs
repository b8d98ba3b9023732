// crates/pce-core/src/core/state.rs
// ============================================================================
// Module: PCE State Snapshot
// Description: Copy-on-write state snapshot with reserved keys and substates.
// Purpose: Provide the single persisted working set for the pipeline.
// Dependencies: serde, serde_json, crate::core
// ============================================================================

//! ## Overview
//! The state snapshot is a mapping from string keys to JSON-shaped values.
//! Reserved top-level keys carry typed substates (approval twin, assistant
//! memory, rover policy, trader strategy) plus bounded history rings. Only one
//! snapshot is live at any instant; components receive a copy and propose the
//! next snapshot through the serialized writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::identifiers::ApprovalId;
use crate::core::identifiers::SessionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved key for the approval + twin substate.
pub const KEY_PCE_OS: &str = "pce_os";
/// Reserved key for per-session assistant memory.
pub const KEY_ASSISTANT: &str = "assistant";
/// Reserved key for the rover policy and parameters.
pub const KEY_ROBOTICS: &str = "robotics";
/// Reserved key for trader strategy state.
pub const KEY_TRADER: &str = "trader";
/// Reserved key for the normalized event ring.
pub const KEY_EVENT_HISTORY: &str = "event_history";
/// Reserved key for the completed action ring.
pub const KEY_ACTION_HISTORY: &str = "action_history";
/// Reserved key for the coherence snapshot ring.
pub const KEY_CCI_HISTORY: &str = "cci_history";

/// Bounded capacity of the event history ring.
pub const EVENT_HISTORY_CAP: usize = 100;
/// Bounded capacity of the action history ring.
pub const ACTION_HISTORY_CAP: usize = 100;
/// Bounded capacity of the coherence history ring.
pub const CCI_HISTORY_CAP: usize = 100;

// ============================================================================
// SECTION: State Snapshot
// ============================================================================

/// Working-set state snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    /// Key/value entries, including reserved substates.
    entries: BTreeMap<String, Value>,
}

impl StateSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a raw entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Inserts a raw entry.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Deserializes an entry into a typed value.
    ///
    /// Malformed entries read as `None`; downstream stages clamp and flag
    /// them rather than failing the merge.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Serializes a typed value into an entry.
    pub fn set_as<T: Serialize>(&mut self, key: impl Into<String>, value: &T) {
        self.entries.insert(key.into(), serde_json::to_value(value).unwrap_or(Value::Null));
    }

    /// Appends a value to a bounded ring entry, evicting the oldest overflow.
    pub fn push_ring(&mut self, key: &str, value: Value, cap: usize) {
        let ring = self.entries.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        if !ring.is_array() {
            *ring = Value::Array(Vec::new());
        }
        if let Value::Array(items) = ring {
            items.push(value);
            while items.len() > cap {
                items.remove(0);
            }
        }
    }

    /// Returns a bounded ring entry as a slice of values.
    #[must_use]
    pub fn ring(&self, key: &str) -> &[Value] {
        self.entries.get(key).and_then(Value::as_array).map_or(&[], Vec::as_slice)
    }

    /// Returns the approval + twin substate, defaulting when absent.
    #[must_use]
    pub fn pce_os(&self) -> PceOsState {
        self.get_as(KEY_PCE_OS).unwrap_or_default()
    }

    /// Writes the approval + twin substate.
    pub fn set_pce_os(&mut self, value: &PceOsState) {
        self.set_as(KEY_PCE_OS, value);
    }

    /// Returns the assistant substate, defaulting when absent.
    #[must_use]
    pub fn assistant(&self) -> AssistantState {
        self.get_as(KEY_ASSISTANT).unwrap_or_default()
    }

    /// Writes the assistant substate.
    pub fn set_assistant(&mut self, value: &AssistantState) {
        self.set_as(KEY_ASSISTANT, value);
    }

    /// Returns the robotics substate, defaulting when absent.
    #[must_use]
    pub fn robotics(&self) -> RoboticsState {
        self.get_as(KEY_ROBOTICS).unwrap_or_default()
    }

    /// Writes the robotics substate.
    pub fn set_robotics(&mut self, value: &RoboticsState) {
        self.set_as(KEY_ROBOTICS, value);
    }

    /// Returns the trader substate, defaulting when absent.
    #[must_use]
    pub fn trader(&self) -> TraderState {
        self.get_as(KEY_TRADER).unwrap_or_default()
    }

    /// Writes the trader substate.
    pub fn set_trader(&mut self, value: &TraderState) {
        self.set_as(KEY_TRADER, value);
    }
}

// ============================================================================
// SECTION: OS Substate
// ============================================================================

/// Approval + twin substate stored under `pce_os`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PceOsState {
    /// Robotics digital twin.
    #[serde(default)]
    pub twin: RoboticsTwin,
    /// Operational counters surfaced by the state endpoint.
    #[serde(default)]
    pub metrics: OsMetrics,
}

/// Operational counters maintained by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OsMetrics {
    /// Events accepted by the validator.
    #[serde(default)]
    pub events_processed: u64,
    /// Actions executed by the orchestrator.
    #[serde(default)]
    pub actions_completed: u64,
    /// Approvals created by the gate.
    #[serde(default)]
    pub approvals_created: u64,
    /// Approvals moved to a terminal state.
    #[serde(default)]
    pub approvals_resolved: u64,
}

/// Persisted robotics digital twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoboticsTwin {
    /// Project phase label.
    pub phase: String,
    /// Total budget granted to the project.
    pub budget_total: f64,
    /// Budget remaining after debits.
    pub budget_remaining: f64,
    /// Current risk posture label.
    pub risk_level: String,
    /// Bill-of-materials adjacency list keyed by component id.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentNode>,
    /// Debited purchases in completion order.
    #[serde(default)]
    pub purchase_history: Vec<PurchaseEntry>,
    /// Operator-visible audit trail.
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,
    /// Recorded test results.
    #[serde(default)]
    pub tests: Vec<TestRecord>,
    /// Recorded simulation summaries.
    #[serde(default)]
    pub simulations: Vec<Value>,
}

impl Default for RoboticsTwin {
    fn default() -> Self {
        Self {
            phase: "PLANNING".to_string(),
            budget_total: 0.0,
            budget_remaining: 0.0,
            risk_level: "LOW".to_string(),
            components: BTreeMap::new(),
            purchase_history: Vec::new(),
            audit_trail: Vec::new(),
            tests: Vec::new(),
            simulations: Vec::new(),
        }
    }
}

/// Bill-of-materials node stored as an adjacency entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Component identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Unit cost.
    pub cost: f64,
    /// Component ids this node depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A single debited purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEntry {
    /// Purchased item label.
    pub item: String,
    /// Debited cost.
    pub cost: f64,
    /// Completion timestamp.
    pub ts: Timestamp,
    /// Approval that authorized the debit, when gated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
}

/// Operator-visible audit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry timestamp.
    pub ts: Timestamp,
    /// Short audit message.
    pub entry: String,
}

/// Recorded hardware or integration test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Test name.
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Recording timestamp.
    pub ts: Timestamp,
}

// ============================================================================
// SECTION: Assistant Substate
// ============================================================================

/// Per-session assistant memory plus bandit bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssistantState {
    /// Current exploration rate; seeded from config on first decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    /// Bandit arm statistics keyed by profile label.
    #[serde(default)]
    pub arms: BTreeMap<String, ArmStats>,
    /// Per-session memory keyed by session id.
    #[serde(default)]
    pub sessions: BTreeMap<SessionId, SessionMemory>,
}

/// Running statistics for one bandit arm.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmStats {
    /// Number of times the arm was selected.
    #[serde(default)]
    pub pulls: u64,
    /// Running mean of observed rewards.
    #[serde(default)]
    pub mean_reward: f64,
}

/// Adaptive memory for one session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionMemory {
    /// Positive-feedback notes, FIFO-bounded.
    #[serde(default)]
    pub preferences: Vec<String>,
    /// Negative-feedback notes, FIFO-bounded.
    #[serde(default)]
    pub avoid: Vec<String>,
    /// Profile used on the most recent turn, for bandit credit assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_profile: Option<String>,
}

// ============================================================================
// SECTION: Robotics Substate
// ============================================================================

/// Rover policy and runtime parameters stored under `robotics`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoboticsState {
    /// Tabular rover policy.
    #[serde(default)]
    pub rover: RoverPolicy,
}

/// Tabular Q policy for the rover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoverPolicy {
    /// Q table keyed by discretized state, then action.
    #[serde(default)]
    pub q: BTreeMap<String, BTreeMap<String, f64>>,
    /// Current exploration rate.
    pub epsilon: f64,
    /// Whether the rover loop is running.
    #[serde(default)]
    pub running: bool,
    /// Last discretized state observed via telemetry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state: Option<String>,
    /// Last action selected by the policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    /// Episode statistics.
    #[serde(default)]
    pub stats: RoverStats,
}

impl Default for RoverPolicy {
    fn default() -> Self {
        Self {
            q: BTreeMap::new(),
            epsilon: 1.0,
            running: false,
            last_state: None,
            last_action: None,
            stats: RoverStats::default(),
        }
    }
}

/// Rover episode statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoverStats {
    /// Completed episodes.
    #[serde(default)]
    pub episodes: u64,
    /// Cumulative reward across episodes.
    #[serde(default)]
    pub total_reward: f64,
    /// Most recent reward signal.
    #[serde(default)]
    pub last_reward: f64,
}

// ============================================================================
// SECTION: Trader Substate
// ============================================================================

/// Trader strategy state stored under `trader`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderState {
    /// Macro regime bias label.
    pub macro_bias: String,
    /// Latest model signal in [-1, 1].
    pub model_signal: f64,
    /// Current exposure fraction of the book.
    pub exposure: f64,
    /// Guardrail ceiling on exposure.
    pub max_exposure: f64,
    /// Whether trading is halted by guardrails.
    #[serde(default)]
    pub halted: bool,
}

impl Default for TraderState {
    fn default() -> Self {
        Self {
            macro_bias: "neutral".to_string(),
            model_signal: 0.0,
            exposure: 0.0,
            max_exposure: 0.5,
            halted: false,
        }
    }
}
