// crates/pce-core/src/core/coherence.rs
// ============================================================================
// Module: PCE Coherence Records
// Description: Coherence index snapshots and component values.
// Purpose: Provide the persisted shape of the coherence metric.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! The coherence engine derives a four-component index from the completed
//! action log. Below the qualifying-action floor the index is fixed at 0.5 and
//! every component reads `"unknown"` on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Component Values
// ============================================================================

/// A coherence component: a number in [0, 1] or the literal `"unknown"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentValue {
    /// Computed component value.
    Known(f64),
    /// Component could not be computed below the qualifying floor.
    Unknown(String),
}

impl ComponentValue {
    /// Builds the canonical unknown marker.
    #[must_use]
    pub fn unknown() -> Self {
        Self::Unknown("unknown".to_string())
    }

    /// Returns the numeric value when known.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Known(value) => Some(*value),
            Self::Unknown(_) => None,
        }
    }
}

/// The four coherence components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CciComponents {
    /// Fraction of recent actions with no violations.
    pub consistency: ComponentValue,
    /// One minus normalized priority variance.
    pub stability: ComponentValue,
    /// Fraction of recent actions with at least one violation.
    pub contradiction_rate: ComponentValue,
    /// One minus mean absolute expected/observed impact error.
    pub predictive_accuracy: ComponentValue,
}

impl CciComponents {
    /// Builds the all-unknown component set used below the qualifying floor.
    #[must_use]
    pub fn all_unknown() -> Self {
        Self {
            consistency: ComponentValue::unknown(),
            stability: ComponentValue::unknown(),
            contradiction_rate: ComponentValue::unknown(),
            predictive_accuracy: ComponentValue::unknown(),
        }
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// One coherence measurement appended after a completed action or a terminal
/// approval resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CciSnapshot {
    /// Measurement timestamp.
    pub ts: Timestamp,
    /// Aggregate coherence index in [0, 1].
    pub cci: f64,
    /// Component breakdown.
    pub components: CciComponents,
}
