// crates/pce-core/src/runtime/validator.rs
// ============================================================================
// Module: PCE Event Validator
// Description: Envelope validation, payload schema checks, and normalization.
// Purpose: Stamp ids and timestamps exactly once and fail closed on bad input.
// Dependencies: crate::core, serde_json, uuid
// ============================================================================

//! ## Overview
//! The event processing layer validates raw envelopes against per-type payload
//! schemas registered at boot. The validator never guesses a schema: an
//! unknown `event_type` is a hard reject. Successful validation stamps
//! `event_id` (UUID v4) and `ts` (server wall-clock milliseconds) exactly
//! once; re-validating an already-normalized event returns it unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::EventId;
use crate::core::EventPayload;
use crate::core::NormalizedEvent;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Event validation errors, surfaced to producers as HTTP 400.
#[derive(Debug, Error)]
pub enum EplError {
    /// Envelope is structurally invalid or names an unregistered event type.
    #[error("invalid_schema: {0}")]
    InvalidSchema(String),
    /// Domain payload violates the registered schema for its event type.
    #[error("invalid_payload: {0}")]
    InvalidPayload(String),
}

// ============================================================================
// SECTION: Payload Schemas
// ============================================================================

/// Expected shape of a required payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string.
    String,
    /// Finite JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// Any JSON value.
    Any,
}

impl FieldKind {
    /// Returns true when the value matches this kind.
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.as_f64().is_some_and(f64::is_finite),
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
        }
    }

    /// Returns the label used in validation errors.
    const fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Any => "any",
        }
    }
}

/// Required field of a payload schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name inside `payload`.
    pub name: &'static str,
    /// Expected shape.
    pub kind: FieldKind,
}

/// Payload schema registered for one event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSchema {
    /// Required fields beyond the shared envelope fields.
    pub required: Vec<FieldSpec>,
}

impl PayloadSchema {
    /// Builds a schema from required field specs.
    #[must_use]
    pub const fn new(required: Vec<FieldSpec>) -> Self {
        Self { required }
    }
}

/// Per-type schema registry populated at boot.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Registered schemas keyed by event type.
    schemas: BTreeMap<String, PayloadSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema for an event type, replacing any previous one.
    pub fn register(&mut self, event_type: impl Into<String>, schema: PayloadSchema) {
        self.schemas.insert(event_type.into(), schema);
    }

    /// Returns the schema for an event type.
    #[must_use]
    pub fn schema(&self, event_type: &str) -> Option<&PayloadSchema> {
        self.schemas.get(event_type)
    }

    /// Builds the registry with every built-in event type.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            "observation.assistant.v1",
            PayloadSchema::new(vec![FieldSpec { name: "text", kind: FieldKind::String }]),
        );
        registry.register(
            "feedback.assistant.v1",
            PayloadSchema::new(vec![FieldSpec { name: "reward", kind: FieldKind::Number }]),
        );
        registry.register(
            "project.goal.defined",
            PayloadSchema::new(vec![FieldSpec { name: "goal", kind: FieldKind::String }]),
        );
        registry.register(
            "part.candidate.added",
            PayloadSchema::new(vec![
                FieldSpec { name: "part_id", kind: FieldKind::String },
                FieldSpec { name: "cost", kind: FieldKind::Number },
            ]),
        );
        registry.register(
            "budget.updated",
            PayloadSchema::new(vec![FieldSpec { name: "amount", kind: FieldKind::Number }]),
        );
        registry.register(
            "purchase.requested",
            PayloadSchema::new(vec![
                FieldSpec { name: "item", kind: FieldKind::String },
                FieldSpec { name: "projected_cost", kind: FieldKind::Number },
            ]),
        );
        registry.register(
            "purchase.completed",
            PayloadSchema::new(vec![
                FieldSpec { name: "item", kind: FieldKind::String },
                FieldSpec { name: "cost", kind: FieldKind::Number },
            ]),
        );
        registry.register(
            "purchase.rejected",
            PayloadSchema::new(vec![FieldSpec { name: "item", kind: FieldKind::String }]),
        );
        registry.register(
            "budget_commit.completed",
            PayloadSchema::new(vec![FieldSpec { name: "cost", kind: FieldKind::Number }]),
        );
        registry.register("budget_commit.rejected", PayloadSchema::new(Vec::new()));
        registry.register(
            "test.result.recorded",
            PayloadSchema::new(vec![
                FieldSpec { name: "name", kind: FieldKind::String },
                FieldSpec { name: "passed", kind: FieldKind::Boolean },
            ]),
        );
        registry.register(
            "market_signal",
            PayloadSchema::new(vec![
                FieldSpec { name: "symbol", kind: FieldKind::String },
                FieldSpec { name: "signal", kind: FieldKind::Number },
            ]),
        );
        registry.register(
            "robot_telemetry",
            PayloadSchema::new(vec![
                FieldSpec { name: "x", kind: FieldKind::Number },
                FieldSpec { name: "y", kind: FieldKind::Number },
            ]),
        );
        registry.register(
            "reward.rover.v1",
            PayloadSchema::new(vec![
                FieldSpec { name: "reward", kind: FieldKind::Number },
                FieldSpec { name: "state", kind: FieldKind::String },
                FieldSpec { name: "action", kind: FieldKind::String },
                FieldSpec { name: "next_state", kind: FieldKind::String },
            ]),
        );
        registry
    }
}

// ============================================================================
// SECTION: Event Validator
// ============================================================================

/// Event processing layer: validation plus normalization.
#[derive(Debug)]
pub struct EventValidator {
    /// Per-type payload schemas.
    registry: SchemaRegistry,
}

impl EventValidator {
    /// Creates a validator over a schema registry.
    #[must_use]
    pub const fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Creates a validator with every built-in event type registered.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(SchemaRegistry::builtin())
    }

    /// Validates a raw envelope and returns the normalized event.
    ///
    /// # Errors
    ///
    /// Returns [`EplError::InvalidSchema`] when the envelope lacks
    /// `event_type`, `source`, or `payload`, or names an unregistered event
    /// type; [`EplError::InvalidPayload`] when the domain payload violates its
    /// registered schema.
    pub fn normalize(&self, raw: &Value) -> Result<NormalizedEvent, EplError> {
        let envelope = raw
            .as_object()
            .ok_or_else(|| EplError::InvalidSchema("envelope must be a JSON object".to_string()))?;
        let event_type = envelope
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| EplError::InvalidSchema("envelope missing event_type".to_string()))?;
        let source = envelope
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| EplError::InvalidSchema("envelope missing source".to_string()))?;
        let payload = envelope
            .get("payload")
            .and_then(Value::as_object)
            .ok_or_else(|| EplError::InvalidSchema("envelope missing payload".to_string()))?;

        let schema = self.registry.schema(event_type).ok_or_else(|| {
            EplError::InvalidSchema(format!("unregistered event_type: {event_type}"))
        })?;

        if !payload.get("domain").is_some_and(Value::is_string) {
            return Err(EplError::InvalidPayload("payload missing domain".to_string()));
        }
        for field in &schema.required {
            let value = payload.get(field.name).ok_or_else(|| {
                EplError::InvalidPayload(format!("payload missing field: {}", field.name))
            })?;
            if !field.kind.matches(value) {
                return Err(EplError::InvalidPayload(format!(
                    "payload field {} must be {}",
                    field.name,
                    field.kind.label()
                )));
            }
        }

        let payload: EventPayload =
            serde_json::from_value(Value::Object(payload.clone())).map_err(|err| {
                EplError::InvalidPayload(format!("payload deserialization failed: {err}"))
            })?;

        Ok(NormalizedEvent {
            event_id: EventId::random(),
            event_type: event_type.to_string(),
            source: source.to_string(),
            ts: Timestamp::now(),
            payload,
        })
    }

    /// Re-validates an already-normalized event.
    ///
    /// The stamped `event_id` and `ts` are preserved untouched; only the
    /// payload schema is re-checked.
    ///
    /// # Errors
    ///
    /// Returns [`EplError`] when the event no longer satisfies its schema.
    pub fn revalidate(&self, event: &NormalizedEvent) -> Result<NormalizedEvent, EplError> {
        let schema = self.registry.schema(&event.event_type).ok_or_else(|| {
            EplError::InvalidSchema(format!("unregistered event_type: {}", event.event_type))
        })?;
        for field in &schema.required {
            let value = event.payload.field(field.name).ok_or_else(|| {
                EplError::InvalidPayload(format!("payload missing field: {}", field.name))
            })?;
            if !field.kind.matches(value) {
                return Err(EplError::InvalidPayload(format!(
                    "payload field {} must be {}",
                    field.name,
                    field.kind.label()
                )));
            }
        }
        Ok(event.clone())
    }
}
