// crates/pce-core/src/runtime/value.rs
// ============================================================================
// Module: PCE Value Evaluator
// Description: Default value-adherence scoring over state and event.
// Purpose: Produce a clamped value score plus violation tags.
// Dependencies: crate::core, crate::interfaces, crate::runtime::registry
// ============================================================================

//! ## Overview
//! The value evaluation layer scores a candidate state plus normalized event
//! in [0, 1]. Domains may override scoring with a registered plugin; when the
//! plugin is missing or fails, the core defaults apply: consistency of tags,
//! non-destructive defaults, and budget positivity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::NormalizedEvent;
use crate::core::StateSnapshot;
use crate::interfaces::ValueAssessment;
use crate::runtime::registry::PluginRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tag pairs treated as mutually inconsistent.
const CONFLICTING_TAG_PAIRS: [(&str, &str); 2] = [("urgent", "deferred"), ("safe", "destructive")];

/// Penalty applied per violation class.
const VIOLATION_PENALTY: f64 = 0.3;

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Value evaluation layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueEvaluator;

impl ValueEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Scores the candidate state and event.
    ///
    /// Plugin overrides apply when registered; plugin failures fall back to
    /// the core defaults. The returned score is always clamped to [0, 1].
    #[must_use]
    pub fn evaluate(
        &self,
        registry: &PluginRegistry,
        state: &StateSnapshot,
        event: &NormalizedEvent,
    ) -> ValueAssessment {
        let assessment = registry
            .value_for(&event.payload.domain)
            .and_then(|plugin| plugin.value_score(state, event).ok())
            .unwrap_or_else(|| default_assessment(state, event));
        ValueAssessment {
            score: assessment.score.clamp(0.0, 1.0),
            violations: assessment.violations,
        }
    }
}

/// Computes the core default value assessment.
#[must_use]
pub fn default_assessment(state: &StateSnapshot, event: &NormalizedEvent) -> ValueAssessment {
    let mut violations = Vec::new();
    let tags = &event.payload.tags;

    for (left, right) in CONFLICTING_TAG_PAIRS {
        if tags.contains(left) && tags.contains(right) {
            violations.push("tag_conflict".to_string());
            break;
        }
    }
    if tags.contains("destructive") && !tags.contains("reversible") {
        violations.push("non_destructive_default".to_string());
    }
    if state.pce_os().twin.budget_remaining < 0.0 {
        violations.push("budget_negative".to_string());
    }

    let penalty = VIOLATION_PENALTY * violations.len() as f64;
    ValueAssessment { score: (1.0 - penalty).clamp(0.0, 1.0), violations }
}
