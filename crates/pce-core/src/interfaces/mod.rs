// crates/pce-core/src/interfaces/mod.rs
// ============================================================================
// Module: PCE Interfaces
// Description: Backend-agnostic interfaces for plugins, replies, and storage.
// Purpose: Define the contract surfaces used by the cognition runtime.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with domain plugins, the LLM
//! reply provider, and durable storage without embedding backend-specific
//! details. A domain registers any subset of the capability traits; missing
//! capabilities fall back to core defaults. Implementations must fail closed:
//! plugin faults downgrade the pipeline, they never abort it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ActionPlan;
use crate::core::ApprovalId;
use crate::core::ApprovalRecord;
use crate::core::CciSnapshot;
use crate::core::CompletedAction;
use crate::core::NormalizedEvent;
use crate::core::StateSnapshot;
use crate::core::TranscriptEntry;
use crate::core::TranscriptItem;

// ============================================================================
// SECTION: Plugin Capabilities
// ============================================================================

/// Plugin execution errors.
///
/// Plugin errors are swallowed by the pipeline: the stage downgrades to its
/// core default and records the failure in the explanation bag.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin reported a failure.
    #[error("plugin failure: {0}")]
    Failure(String),
}

/// Result of merging an event into a candidate state.
///
/// Merges are total functions: malformed domain state is clamped and flagged
/// as a violation tag rather than surfaced as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Proposed next snapshot.
    pub state: StateSnapshot,
    /// Value-violation tags accumulated during the merge.
    pub violations: Vec<String>,
}

/// Domain-supplied deterministic state merge.
pub trait StateMerge: Send + Sync {
    /// Merges a normalized event into the candidate snapshot.
    fn merge(&self, state: StateSnapshot, event: &NormalizedEvent) -> MergeOutcome;
}

/// Value assessment over a candidate state and event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAssessment {
    /// Value-adherence score in [0, 1].
    pub score: f64,
    /// Value-violation tags.
    #[serde(default)]
    pub violations: Vec<String>,
}

/// Domain-supplied value scoring.
pub trait ValuePlugin: Send + Sync {
    /// Scores the candidate state and event against registered values.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when scoring fails; the pipeline substitutes
    /// the core default scorer.
    fn value_score(
        &self,
        state: &StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<ValueAssessment, PluginError>;
}

/// Immutable inputs to a deliberation.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    /// Value-adherence score from the evaluation layer.
    pub value_score: f64,
    /// Violations accumulated so far for this event.
    pub violations: &'a [String],
    /// Coherence snapshot computed before deliberation.
    pub cci: &'a CciSnapshot,
    /// Normalized event under deliberation.
    pub event: &'a NormalizedEvent,
}

/// Deliberation output: the plan plus any plugin state bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Candidate snapshot with plugin bookkeeping applied.
    pub state: StateSnapshot,
    /// Proposed action plan.
    pub plan: ActionPlan,
}

/// Domain-supplied deliberation.
#[async_trait]
pub trait DecisionPlugin: Send + Sync {
    /// Deliberates an action plan for the event.
    ///
    /// The candidate snapshot is passed by value so the plugin can persist
    /// bandit or policy bookkeeping alongside its plan.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when deliberation fails; the pipeline
    /// downgrades to the core default plan with
    /// `override_reason = "plugin_error"`.
    async fn decide(
        &self,
        state: StateSnapshot,
        inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError>;
}

/// Domain-supplied adaptive feedback application.
pub trait AdaptPlugin: Send + Sync {
    /// Applies a feedback event to domain memory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when adaptation fails; the pipeline keeps the
    /// unadapted snapshot.
    fn adapt(
        &self,
        state: StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<StateSnapshot, PluginError>;
}

/// Domain-supplied observed-impact probe.
pub trait ImpactProbe: Send + Sync {
    /// Observes the realized impact of an executed plan.
    ///
    /// Returns `None` when the domain has no probe for this action type; the
    /// orchestrator records `expected_impact` as the stand-in.
    fn observe_impact(&self, state: &StateSnapshot, plan: &ActionPlan) -> Option<f64>;
}

// ============================================================================
// SECTION: Reply Provider
// ============================================================================

/// Request to the LLM reply provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    /// Prompt text assembled by the decision plugin.
    pub prompt: String,
    /// Session preference hints.
    #[serde(default)]
    pub preferences: Vec<String>,
    /// Session avoidance hints.
    #[serde(default)]
    pub avoid: Vec<String>,
}

/// Reply returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmReply {
    /// Reply text.
    pub text: String,
    /// Decoding description recorded in the explanation bag.
    pub decoding: String,
}

/// Sanitized LLM provider failures.
///
/// Labels are safe to persist in transcripts and explanation bags; raw
/// provider responses and secrets never leave the adapter.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication or authorization failure.
    #[error("auth")]
    Auth,
    /// The provider missed the hard deadline.
    #[error("timeout")]
    Timeout,
    /// The provider rate-limited the request.
    #[error("rate_limited")]
    RateLimited,
    /// Transport-level failure with a short sanitized description.
    #[error("transport: {0}")]
    Transport(String),
}

impl LlmError {
    /// Returns the short sanitized label recorded in explanation bags.
    #[must_use]
    pub fn sanitized_label(&self) -> String {
        self.to_string()
    }
}

/// Time-boxed LLM reply provider.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Generates a reply within the provider's hard deadline.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on failure; callers substitute a fallback reply.
    async fn reply(&self, request: &ReplyRequest) -> Result<LlmReply, LlmError>;
}

// ============================================================================
// SECTION: Cognition Store
// ============================================================================

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("cognition store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("cognition store corruption: {0}")]
    Corrupt(String),
    /// Store data is invalid.
    #[error("cognition store invalid data: {0}")]
    Invalid(String),
    /// Write contention; the serialized writer retries once before failing.
    #[error("cognition store write conflict: {0}")]
    Conflict(String),
    /// Store reported an error.
    #[error("cognition store error: {0}")]
    Store(String),
}

/// Durable store owning all persisted entities.
///
/// Every other component reads a snapshot and proposes writes through the
/// engine's serialized writer; the store itself guards a single connection.
pub trait CognitionStore: Send + Sync {
    /// Loads the live state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_state(&self) -> Result<StateSnapshot, StoreError>;

    /// Persists the live state snapshot (copy-on-write, atomic).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persisting fails.
    fn save_state(&self, state: &StateSnapshot) -> Result<(), StoreError>;

    /// Appends a normalized event to the event log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_event(&self, event: &NormalizedEvent) -> Result<(), StoreError>;

    /// Appends a completed action to the action log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_action(&self, action: &CompletedAction) -> Result<(), StoreError>;

    /// Returns the most recent completed actions ordered oldest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn recent_actions(&self, limit: usize) -> Result<Vec<CompletedAction>, StoreError>;

    /// Appends a coherence snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_cci(&self, snapshot: &CciSnapshot) -> Result<(), StoreError>;

    /// Returns the most recent coherence snapshots ordered oldest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn cci_history(&self, limit: usize) -> Result<Vec<CciSnapshot>, StoreError>;

    /// Inserts or updates an approval record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persisting fails.
    fn put_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError>;

    /// Loads an approval record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn approval(&self, id: &ApprovalId) -> Result<Option<ApprovalRecord>, StoreError>;

    /// Returns all approval records ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn approvals(&self) -> Result<Vec<ApprovalRecord>, StoreError>;

    /// Appends a transcript entry and returns it with its assigned cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_transcript(&self, entry: &TranscriptEntry) -> Result<TranscriptItem, StoreError>;

    /// Returns transcript items with cursor strictly greater than `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn transcript_since(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<Vec<TranscriptItem>, StoreError>;

    /// Returns the latest assigned transcript cursor, zero when empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_cursor(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared cognition store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedCognitionStore {
    /// Inner store implementation.
    inner: Arc<dyn CognitionStore>,
}

impl SharedCognitionStore {
    /// Wraps a cognition store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl CognitionStore + 'static) -> Self {
        Self { inner: Arc::new(store) }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn CognitionStore>) -> Self {
        Self { inner: store }
    }
}

impl CognitionStore for SharedCognitionStore {
    fn load_state(&self) -> Result<StateSnapshot, StoreError> {
        self.inner.load_state()
    }

    fn save_state(&self, state: &StateSnapshot) -> Result<(), StoreError> {
        self.inner.save_state(state)
    }

    fn append_event(&self, event: &NormalizedEvent) -> Result<(), StoreError> {
        self.inner.append_event(event)
    }

    fn append_action(&self, action: &CompletedAction) -> Result<(), StoreError> {
        self.inner.append_action(action)
    }

    fn recent_actions(&self, limit: usize) -> Result<Vec<CompletedAction>, StoreError> {
        self.inner.recent_actions(limit)
    }

    fn append_cci(&self, snapshot: &CciSnapshot) -> Result<(), StoreError> {
        self.inner.append_cci(snapshot)
    }

    fn cci_history(&self, limit: usize) -> Result<Vec<CciSnapshot>, StoreError> {
        self.inner.cci_history(limit)
    }

    fn put_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        self.inner.put_approval(record)
    }

    fn approval(&self, id: &ApprovalId) -> Result<Option<ApprovalRecord>, StoreError> {
        self.inner.approval(id)
    }

    fn approvals(&self) -> Result<Vec<ApprovalRecord>, StoreError> {
        self.inner.approvals()
    }

    fn append_transcript(&self, entry: &TranscriptEntry) -> Result<TranscriptItem, StoreError> {
        self.inner.append_transcript(entry)
    }

    fn transcript_since(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<Vec<TranscriptItem>, StoreError> {
        self.inner.transcript_since(cursor, limit)
    }

    fn latest_cursor(&self) -> Result<u64, StoreError> {
        self.inner.latest_cursor()
    }
}
