// crates/pce-core/src/core/mod.rs
// ============================================================================
// Module: PCE Core Types
// Description: Canonical event, state, action, approval, and log structures.
// Purpose: Provide stable, serializable types for the cognition pipeline.
// Dependencies: serde, serde_json, uuid
// ============================================================================

//! ## Overview
//! Core types define the event envelope, the persisted state snapshot with its
//! reserved substates, action plans and completions, the approval state
//! machine, coherence snapshots, and transcript items. These types are the
//! canonical source of truth for any derived API surfaces.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod action;
pub mod approval;
pub mod coherence;
pub mod event;
pub mod identifiers;
pub mod state;
pub mod time;
pub mod transcript;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use action::ActionMetadata;
pub use action::ActionPlan;
pub use action::CompletedAction;
pub use approval::ApprovalRecord;
pub use approval::ApprovalResolution;
pub use approval::ApprovalStatus;
pub use coherence::CciComponents;
pub use coherence::CciSnapshot;
pub use coherence::ComponentValue;
pub use event::EventEnvelope;
pub use event::EventPayload;
pub use event::NormalizedEvent;
pub use identifiers::ActionId;
pub use identifiers::ApprovalId;
pub use identifiers::CorrelationId;
pub use identifiers::DecisionId;
pub use identifiers::EventId;
pub use identifiers::SessionId;
pub use state::ACTION_HISTORY_CAP;
pub use state::ArmStats;
pub use state::AssistantState;
pub use state::AuditEntry;
pub use state::CCI_HISTORY_CAP;
pub use state::ComponentNode;
pub use state::EVENT_HISTORY_CAP;
pub use state::KEY_ACTION_HISTORY;
pub use state::KEY_ASSISTANT;
pub use state::KEY_CCI_HISTORY;
pub use state::KEY_EVENT_HISTORY;
pub use state::KEY_PCE_OS;
pub use state::KEY_ROBOTICS;
pub use state::KEY_TRADER;
pub use state::OsMetrics;
pub use state::PceOsState;
pub use state::PurchaseEntry;
pub use state::RoboticsState;
pub use state::RoboticsTwin;
pub use state::RoverPolicy;
pub use state::RoverStats;
pub use state::SessionMemory;
pub use state::StateSnapshot;
pub use state::TestRecord;
pub use state::TraderState;
pub use time::Timestamp;
pub use transcript::TranscriptEntry;
pub use transcript::TranscriptItem;
pub use transcript::TranscriptKind;
