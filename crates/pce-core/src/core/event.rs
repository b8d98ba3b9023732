// crates/pce-core/src/core/event.rs
// ============================================================================
// Module: PCE Event Model
// Description: Wire envelope, domain payload, and normalized event records.
// Purpose: Provide stable, serializable event types for the pipeline.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! Producers submit an [`EventEnvelope`]; the validator normalizes it into a
//! [`NormalizedEvent`] with a server-assigned id and wall-clock stamp. Domain
//! payloads are heterogeneous: known shared fields are typed, everything else
//! rides in `extra` and is validated against the per-type schema registered at
//! boot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::SessionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Wire Envelope
// ============================================================================

/// Raw event envelope as submitted by producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Stable event type tag.
    pub event_type: String,
    /// Producer identifier.
    pub source: String,
    /// Domain payload, validated against the registered schema.
    pub payload: Value,
}

// ============================================================================
// SECTION: Domain Payload
// ============================================================================

/// Parsed domain payload carried by every normalized event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventPayload {
    /// Dispatch key selecting the domain plugin set.
    pub domain: String,
    /// Optional per-session memory key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Optional producer-supplied correlation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Free-form tags attached by the producer.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Remaining domain-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventPayload {
    /// Returns a domain field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Returns a domain field as a finite number.
    #[must_use]
    pub fn number_field(&self, name: &str) -> Option<f64> {
        self.extra.get(name).and_then(Value::as_f64).filter(|value| value.is_finite())
    }

    /// Returns a domain field as a string slice.
    #[must_use]
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }

    /// Returns a domain field as a boolean.
    #[must_use]
    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.extra.get(name).and_then(Value::as_bool)
    }
}

// ============================================================================
// SECTION: Normalized Event
// ============================================================================

/// Event after validation and normalization.
///
/// # Invariants
/// - `event_id` and `ts` are assigned once by the validator and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Server-assigned event identifier (UUID v4).
    pub event_id: EventId,
    /// Stable event type tag.
    pub event_type: String,
    /// Producer identifier.
    pub source: String,
    /// Server wall-clock stamp in unix milliseconds.
    pub ts: Timestamp,
    /// Parsed domain payload.
    pub payload: EventPayload,
}

impl NormalizedEvent {
    /// Returns the correlation identifier, falling back to the event id.
    ///
    /// Every transcript item carries a correlation; producers that omit one
    /// get their event grouped under its own id.
    #[must_use]
    pub fn correlation(&self) -> CorrelationId {
        self.payload
            .correlation_id
            .clone()
            .unwrap_or_else(|| CorrelationId::new(self.event_id.as_str()))
    }

    /// Returns true when this event is feedback for the adaptation stage.
    #[must_use]
    pub fn is_feedback(&self) -> bool {
        self.event_type.starts_with("feedback.") || self.event_type.starts_with("reward.")
    }
}
