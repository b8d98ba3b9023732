// crates/pce-core/src/runtime/approvals.rs
// ============================================================================
// Module: PCE Approval Gate
// Description: Human-in-the-loop interception of sensitive action plans.
// Purpose: Enforce the pending-to-terminal state machine and budget checks.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The approval gate creates pending records for sensitive plans and resolves
//! them via operator input. An approval transitions from pending to exactly
//! one terminal state; terminal records are immutable. The budget precondition
//! reads the twin at approve-time; overrides bypass it. A sweeper expires
//! pending records past their TTL, including a lazy sweep at boot before any
//! new ingress.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ActionPlan;
use crate::core::ApprovalId;
use crate::core::ApprovalRecord;
use crate::core::ApprovalResolution;
use crate::core::ApprovalStatus;
use crate::core::CorrelationId;
use crate::core::DecisionId;
use crate::core::StateSnapshot;
use crate::core::Timestamp;
use crate::interfaces::CognitionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Action types whose approval requires a positive budget check.
pub const BUDGET_GATED_ACTIONS: [&str; 2] = ["purchase", "budget_commit"];

/// Default approval TTL in milliseconds (24 hours).
pub const DEFAULT_APPROVAL_TTL_MS: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Approval gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// No approval exists for the identifier.
    #[error("approval_not_found: {0}")]
    NotFound(String),
    /// The approval already reached a terminal state.
    #[error("approval_already_terminal: {0}")]
    AlreadyTerminal(String),
    /// The twin budget cannot cover the projected cost.
    #[error("insufficient_budget_for_purchase")]
    InsufficientBudget {
        /// Projected cost of the gated action.
        required: f64,
        /// Budget remaining in the twin.
        available: f64,
    },
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Approval gate over the cognition store.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalGate {
    /// TTL applied to pending approvals, in milliseconds.
    ttl_ms: i64,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_TTL_MS)
    }
}

impl ApprovalGate {
    /// Creates a gate with the given TTL.
    #[must_use]
    pub const fn new(ttl_ms: i64) -> Self {
        Self { ttl_ms }
    }

    /// Creates a pending approval for a gated plan.
    ///
    /// The pending record never mutates the twin substate; budget effects
    /// apply only through the terminal completion event.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Store`] when persisting fails.
    pub fn create(
        &self,
        store: &dyn CognitionStore,
        plan: ActionPlan,
        decision_id: DecisionId,
        correlation_id: Option<CorrelationId>,
        now: Timestamp,
    ) -> Result<ApprovalRecord, GateError> {
        let record = ApprovalRecord {
            approval_id: ApprovalId::random(),
            decision_id,
            status: ApprovalStatus::Pending,
            projected_cost: plan.metadata.projected_cost.unwrap_or(0.0),
            risk: plan.metadata.risk.clone().unwrap_or_else(|| "MEDIUM".to_string()),
            rationale: plan.rationale.clone(),
            correlation_id,
            action: plan,
            created_at: now,
            resolved_at: None,
            actor: None,
            notes: None,
            override_applied: false,
        };
        store.put_approval(&record)?;
        Ok(record)
    }

    /// Resolves a pending approval with operator input.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotFound`] for unknown identifiers,
    /// [`GateError::AlreadyTerminal`] when the record is no longer pending,
    /// and [`GateError::InsufficientBudget`] when the approve-time budget
    /// check fails. The record stays pending on budget failure.
    pub fn resolve(
        &self,
        store: &dyn CognitionStore,
        state: &StateSnapshot,
        id: &ApprovalId,
        resolution: &ApprovalResolution,
        now: Timestamp,
    ) -> Result<ApprovalRecord, GateError> {
        let mut record =
            store.approval(id)?.ok_or_else(|| GateError::NotFound(id.to_string()))?;
        if record.status.is_terminal() {
            return Err(GateError::AlreadyTerminal(id.to_string()));
        }

        if matches!(resolution, ApprovalResolution::Approve { .. })
            && BUDGET_GATED_ACTIONS.contains(&record.action.action_type.as_str())
        {
            let available = state.pce_os().twin.budget_remaining;
            if available < record.projected_cost {
                return Err(GateError::InsufficientBudget {
                    required: record.projected_cost,
                    available,
                });
            }
        }

        record.status = resolution.target_status();
        record.resolved_at = Some(now);
        record.actor = Some(resolution.actor().to_string());
        record.notes = Some(resolution.notes().to_string());
        record.override_applied = matches!(resolution, ApprovalResolution::Override { .. });
        store.put_approval(&record)?;
        Ok(record)
    }

    /// Expires pending approvals whose TTL elapsed.
    ///
    /// Only records with `now - created_at >= ttl` move; no action executes
    /// for an expired approval.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Store`] when the sweep fails to persist.
    pub fn sweep(
        &self,
        store: &dyn CognitionStore,
        now: Timestamp,
    ) -> Result<Vec<ApprovalRecord>, GateError> {
        let mut expired = Vec::new();
        for mut record in store.approvals()? {
            if record.status == ApprovalStatus::Pending
                && now.millis_since(record.created_at) >= self.ttl_ms
            {
                record.status = ApprovalStatus::Expired;
                record.resolved_at = Some(now);
                store.put_approval(&record)?;
                expired.push(record);
            }
        }
        Ok(expired)
    }
}
