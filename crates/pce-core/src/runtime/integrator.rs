// crates/pce-core/src/runtime/integrator.rs
// ============================================================================
// Module: PCE State Integrator
// Description: Event-to-state merge producing a candidate snapshot.
// Purpose: Apply core bookkeeping then delegate to the domain merge plugin.
// Dependencies: crate::core, crate::interfaces, crate::runtime::registry
// ============================================================================

//! ## Overview
//! The integrator reads the latest snapshot and produces the proposed next
//! snapshot. It never writes: the orchestrator persists the candidate after
//! downstream stages run. Merges are total functions; malformed domain state
//! is clamped and flagged as a violation tag for the value layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::EVENT_HISTORY_CAP;
use crate::core::KEY_EVENT_HISTORY;
use crate::core::NormalizedEvent;
use crate::core::StateSnapshot;
use crate::interfaces::MergeOutcome;
use crate::runtime::registry::PluginRegistry;

// ============================================================================
// SECTION: Integrator
// ============================================================================

/// Internal state integrator.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateIntegrator;

impl StateIntegrator {
    /// Creates an integrator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Merges a normalized event into the candidate snapshot.
    ///
    /// Core bookkeeping appends the event to the bounded history ring; the
    /// domain merge plugin, when registered, applies domain semantics on top.
    #[must_use]
    pub fn integrate(
        &self,
        registry: &PluginRegistry,
        state: StateSnapshot,
        event: &NormalizedEvent,
    ) -> MergeOutcome {
        let mut candidate = state;
        candidate.push_ring(
            KEY_EVENT_HISTORY,
            serde_json::to_value(event).unwrap_or(Value::Null),
            EVENT_HISTORY_CAP,
        );

        match registry.merge_for(&event.payload.domain) {
            Some(merge) => merge.merge(candidate, event),
            None => MergeOutcome { state: candidate, violations: Vec::new() },
        }
    }
}
