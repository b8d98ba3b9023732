// crates/pce-core/src/core/transcript.rs
// ============================================================================
// Module: PCE Transcript Records
// Description: Append-only operational log items with gap-free cursors.
// Purpose: Provide the single source of truth behind live streams.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! Every pipeline stage appends one transcript item. The store assigns a
//! strictly monotonic, gap-free cursor per instance; SSE and WebSocket streams
//! are views over this sequence, and reconnecting consumers catch up with
//! `?since=<cursor>`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::DecisionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Transcript Kind
// ============================================================================

/// Kind tag for a transcript item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    /// A normalized event entered the pipeline.
    EventIngested,
    /// An agent produced an operator-visible message.
    AgentMessage,
    /// The decision engine proposed an action plan.
    ActionsProposed,
    /// The approval gate created a pending record.
    ApprovalCreated,
    /// An approval moved to a terminal state.
    ApprovalUpdated,
    /// The working-set snapshot was persisted.
    StateUpdated,
}

impl TranscriptKind {
    /// Returns the wire label for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EventIngested => "event_ingested",
            Self::AgentMessage => "agent_message",
            Self::ActionsProposed => "actions_proposed",
            Self::ApprovalCreated => "approval_created",
            Self::ApprovalUpdated => "approval_updated",
            Self::StateUpdated => "state_updated",
        }
    }

    /// Returns the SSE event name for this kind.
    #[must_use]
    pub const fn sse_event(self) -> &'static str {
        match self {
            Self::EventIngested => "os.event_ingested",
            Self::AgentMessage => "os.agent_message",
            Self::ActionsProposed => "os.actions_proposed",
            Self::ApprovalCreated => "os.approval_created",
            Self::ApprovalUpdated => "os.approval_updated",
            Self::StateUpdated => "os.state_updated",
        }
    }
}

// ============================================================================
// SECTION: Transcript Items
// ============================================================================

/// Cursor-less transcript input appended by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Entry timestamp.
    pub ts: Timestamp,
    /// Kind tag.
    pub kind: TranscriptKind,
    /// Emitting agent, when stage output is agent-attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Stage payload.
    pub payload: Value,
    /// Correlation grouping related items for audit.
    pub correlation_id: CorrelationId,
    /// Deliberation the item belongs to, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<DecisionId>,
}

/// Persisted transcript item with its store-assigned cursor.
///
/// # Invariants
/// - Cursors are strictly monotonic and gap-free per store instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptItem {
    /// Store-assigned monotonic cursor.
    pub cursor: u64,
    /// Entry timestamp.
    pub ts: Timestamp,
    /// Kind tag.
    pub kind: TranscriptKind,
    /// Emitting agent, when stage output is agent-attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Stage payload.
    pub payload: Value,
    /// Correlation grouping related items for audit.
    pub correlation_id: CorrelationId,
    /// Deliberation the item belongs to, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<DecisionId>,
}

impl TranscriptItem {
    /// Attaches a cursor to an entry.
    #[must_use]
    pub fn from_entry(cursor: u64, entry: TranscriptEntry) -> Self {
        Self {
            cursor,
            ts: entry.ts,
            kind: entry.kind,
            agent: entry.agent,
            payload: entry.payload,
            correlation_id: entry.correlation_id,
            decision_id: entry.decision_id,
        }
    }
}
