// crates/pce-core/src/core/approval.rs
// ============================================================================
// Module: PCE Approval Records
// Description: Pending approval records and their terminal state machine.
// Purpose: Provide the persisted shape of human-in-the-loop gating.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! Sensitive action plans suspend behind an [`ApprovalRecord`]. An approval
//! transitions from `pending` to exactly one terminal state; terminal records
//! are immutable. Budget debits happen only on terminal `approved` or
//! `overridden`, applied by the synthesized completion event, never by the
//! pending record itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::action::ActionPlan;
use crate::core::identifiers::ApprovalId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::DecisionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Approval Status
// ============================================================================

/// Lifecycle status of an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting operator input.
    Pending,
    /// Operator approved; completion event synthesized.
    Approved,
    /// Operator rejected; audit-only completion event synthesized.
    Rejected,
    /// Operator forced execution past the budget check.
    Overridden,
    /// TTL elapsed without operator input.
    Expired,
}

impl ApprovalStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the wire label for this status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Overridden => "overridden",
            Self::Expired => "expired",
        }
    }
}

// ============================================================================
// SECTION: Approval Record
// ============================================================================

/// Persisted approval record.
///
/// # Invariants
/// - At most one terminal transition exists per record.
/// - A pending record never mutates the twin substate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Approval identifier.
    pub approval_id: ApprovalId,
    /// Deliberation that produced the gated plan.
    pub decision_id: DecisionId,
    /// Lifecycle status.
    pub status: ApprovalStatus,
    /// Full gated action plan.
    pub action: ActionPlan,
    /// Projected cost evaluated against the twin budget at approve-time.
    pub projected_cost: f64,
    /// Declared risk label.
    pub risk: String,
    /// Rationale copied from the plan.
    pub rationale: String,
    /// Correlation of the event that produced the gated plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Resolution timestamp once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Operator that resolved the approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Operator notes or rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set when the operator forced execution past the budget check.
    #[serde(rename = "override", default)]
    pub override_applied: bool,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Operator input resolving a pending approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalResolution {
    /// Approve after the budget precondition passes.
    Approve {
        /// Resolving operator.
        actor: String,
        /// Operator notes.
        notes: String,
    },
    /// Reject; no precondition beyond pending status.
    Reject {
        /// Resolving operator.
        actor: String,
        /// Rejection reason.
        reason: String,
    },
    /// Force execution regardless of the budget check.
    Override {
        /// Resolving operator.
        actor: String,
        /// Operator notes.
        notes: String,
    },
}

impl ApprovalResolution {
    /// Returns the terminal status this resolution produces.
    #[must_use]
    pub const fn target_status(&self) -> ApprovalStatus {
        match self {
            Self::Approve { .. } => ApprovalStatus::Approved,
            Self::Reject { .. } => ApprovalStatus::Rejected,
            Self::Override { .. } => ApprovalStatus::Overridden,
        }
    }

    /// Returns the resolving operator.
    #[must_use]
    pub fn actor(&self) -> &str {
        match self {
            Self::Approve { actor, .. } | Self::Reject { actor, .. } | Self::Override { actor, .. } => {
                actor
            }
        }
    }

    /// Returns the operator notes or rejection reason.
    #[must_use]
    pub fn notes(&self) -> &str {
        match self {
            Self::Approve { notes, .. } | Self::Override { notes, .. } => notes,
            Self::Reject { reason, .. } => reason,
        }
    }
}
