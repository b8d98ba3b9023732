// crates/pce-core/src/runtime/coherence.rs
// ============================================================================
// Module: PCE Coherence Engine
// Description: Four-component coherence index over the completed action log.
// Purpose: Derive a stable, bounded coherence metric with fixed weights.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The coherence engine derives the index from the last W completed actions
//! ordered by completion time. Weights are fixed constants and do not drift.
//! Below the qualifying floor of three actions the index is 0.5 and every
//! component reads unknown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::CciComponents;
use crate::core::CciSnapshot;
use crate::core::CompletedAction;
use crate::core::ComponentValue;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default sliding window over completed actions.
pub const DEFAULT_CCI_WINDOW: usize = 50;
/// Minimum qualifying actions before the index is computed.
pub const MIN_QUALIFYING_ACTIONS: usize = 3;
/// Index value reported below the qualifying floor.
pub const COLD_START_CCI: f64 = 0.5;
/// Maximum priority variance; priorities clamp to 0..=10 so the worst split
/// (half at 0, half at 10) yields a variance of 25.
pub const PRIORITY_VAR_MAX: f64 = 25.0;

// ============================================================================
// SECTION: Weights
// ============================================================================

/// Fixed component weights for the aggregate index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CciWeights {
    /// Weight of the consistency component.
    pub consistency: f64,
    /// Weight of the stability component.
    pub stability: f64,
    /// Weight of the inverted contradiction rate.
    pub contradiction: f64,
    /// Weight of the predictive accuracy component.
    pub predictive: f64,
}

impl Default for CciWeights {
    fn default() -> Self {
        Self { consistency: 0.35, stability: 0.25, contradiction: 0.25, predictive: 0.15 }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Coherence index engine.
#[derive(Debug, Clone, Copy)]
pub struct CoherenceEngine {
    /// Sliding window size W.
    window: usize,
    /// Fixed component weights.
    weights: CciWeights,
}

impl Default for CoherenceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CCI_WINDOW, CciWeights::default())
    }
}

impl CoherenceEngine {
    /// Creates an engine with the given window and weights.
    #[must_use]
    pub const fn new(window: usize, weights: CciWeights) -> Self {
        Self { window, weights }
    }

    /// Returns the sliding window size.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Computes a coherence snapshot from the completed action log.
    ///
    /// `actions` must be ordered oldest-first; only the last W qualify.
    #[must_use]
    pub fn compute(&self, actions: &[CompletedAction], now: Timestamp) -> CciSnapshot {
        let start = actions.len().saturating_sub(self.window);
        let recent = &actions[start..];
        if recent.len() < MIN_QUALIFYING_ACTIONS {
            return CciSnapshot {
                ts: now,
                cci: COLD_START_CCI,
                components: CciComponents::all_unknown(),
            };
        }

        let total = recent.len() as f64;
        let clean = recent.iter().filter(|action| action.violations.is_empty()).count() as f64;
        let consistency = clean / total;
        let contradiction_rate = 1.0 - consistency;

        let priorities: Vec<f64> =
            recent.iter().map(|action| action.plan.priority.clamp(0, 10) as f64).collect();
        let stability = (1.0 - variance(&priorities) / PRIORITY_VAR_MAX).clamp(0.0, 1.0);

        let errors: Vec<f64> = recent
            .iter()
            .map(|action| (action.plan.expected_impact - action.observed_impact).abs())
            .collect();
        let predictive_accuracy = (1.0 - mean(&errors)).clamp(0.0, 1.0);

        let cci = self.weights.consistency.mul_add(
            consistency,
            self.weights.stability.mul_add(
                stability,
                self.weights.contradiction.mul_add(
                    1.0 - contradiction_rate,
                    self.weights.predictive * predictive_accuracy,
                ),
            ),
        );

        CciSnapshot {
            ts: now,
            cci: cci.clamp(0.0, 1.0),
            components: CciComponents {
                consistency: ComponentValue::Known(consistency),
                stability: ComponentValue::Known(stability),
                contradiction_rate: ComponentValue::Known(contradiction_rate),
                predictive_accuracy: ComponentValue::Known(predictive_accuracy),
            },
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Arithmetic mean; zero for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; zero for an empty slice.
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = mean(values);
    values.iter().map(|value| (value - center).powi(2)).sum::<f64>() / values.len() as f64
}
