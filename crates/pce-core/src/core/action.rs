// crates/pce-core/src/core/action.rs
// ============================================================================
// Module: PCE Action Records
// Description: Action plans produced by deliberation and completed actions.
// Purpose: Provide stable, serializable action types for the pipeline.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! The decision engine produces an [`ActionPlan`] per event. Non-gated plans
//! execute synchronously and persist as a [`CompletedAction`] with observed
//! impact and accumulated violations; gated plans suspend behind an approval
//! instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ActionId;
use crate::core::identifiers::DecisionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Plan
// ============================================================================

/// Free-form metadata attached to an action plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionMetadata {
    /// Explanation bag keyed by pipeline stage.
    #[serde(default)]
    pub explain: BTreeMap<String, Value>,
    /// Declared risk label (`LOW`/`MEDIUM`/`HIGH`) when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    /// Projected cost for budget-gated actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_cost: Option<f64>,
    /// Subject the action acts on (part id, item label, symbol).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ActionMetadata {
    /// Inserts an entry into the decision-engine explanation bag.
    pub fn explain_de(&mut self, key: &str, value: Value) {
        let de = self
            .explain
            .entry("de".to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !de.is_object() {
            *de = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = de {
            map.insert(key.to_string(), value);
        }
    }

    /// Reads an entry from the decision-engine explanation bag.
    #[must_use]
    pub fn de_entry(&self, key: &str) -> Option<&Value> {
        self.explain.get("de").and_then(|de| de.get(key))
    }
}

/// Action plan produced by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Action type tag.
    pub action_type: String,
    /// Owning domain dispatch key.
    pub domain: String,
    /// Scheduling priority; clamped to 0..=10 for coherence statistics.
    pub priority: i64,
    /// Human-readable rationale.
    pub rationale: String,
    /// Expected impact in [0, 1].
    pub expected_impact: f64,
    /// Whether the plan must pass the approval gate before executing.
    #[serde(default)]
    pub requires_approval: bool,
    /// Free-form metadata, including the explanation bag.
    #[serde(default)]
    pub metadata: ActionMetadata,
}

impl ActionPlan {
    /// Builds the core default plan: observe with priority 1.
    #[must_use]
    pub fn observe(domain: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            action_type: "observe".to_string(),
            domain: domain.into(),
            priority: 1,
            rationale: rationale.into(),
            expected_impact: 0.5,
            requires_approval: false,
            metadata: ActionMetadata::default(),
        }
    }
}

// ============================================================================
// SECTION: Completed Action
// ============================================================================

/// Action plan after execution, with observed impact and violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAction {
    /// Action identifier.
    pub action_id: ActionId,
    /// Deliberation that produced the plan.
    pub decision_id: DecisionId,
    /// Executed plan.
    #[serde(flatten)]
    pub plan: ActionPlan,
    /// Impact observed by the domain probe, or the expected stand-in.
    pub observed_impact: f64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Value-violation tags accumulated across merge and scoring.
    #[serde(default)]
    pub violations: Vec<String>,
    /// Completion timestamp.
    pub completed_at: Timestamp,
}
