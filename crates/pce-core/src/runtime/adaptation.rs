// crates/pce-core/src/runtime/adaptation.rs
// ============================================================================
// Module: PCE Adaptation Helpers
// Description: Session memory bounds and tabular Q-learning primitives.
// Purpose: Shared adaptive-feedback arithmetic used by domain plugins.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The adaptive feedback system updates per-domain memory from reward events.
//! These helpers keep the arithmetic in one place: FIFO-bounded session note
//! lists, the tabular Q-update, and monotonic epsilon decay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Per-session cap on preference and avoidance notes.
pub const SESSION_MEMORY_CAP: usize = 32;

// ============================================================================
// SECTION: Session Memory
// ============================================================================

/// Appends a note to a FIFO-bounded memory list.
///
/// When the list is at capacity the oldest note is evicted first.
pub fn remember(notes: &mut Vec<String>, note: impl Into<String>) {
    notes.push(note.into());
    while notes.len() > SESSION_MEMORY_CAP {
        notes.remove(0);
    }
}

// ============================================================================
// SECTION: Tabular Q-Learning
// ============================================================================

/// Applies one tabular Q-update:
/// `Q(s,a) <- Q(s,a) + alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`.
pub fn q_update(
    q: &mut BTreeMap<String, BTreeMap<String, f64>>,
    state: &str,
    action: &str,
    reward: f64,
    next_state: &str,
    alpha: f64,
    gamma: f64,
) {
    let next_best = q
        .get(next_state)
        .and_then(|actions| {
            actions.values().copied().fold(None, |best: Option<f64>, value| {
                Some(best.map_or(value, |current| current.max(value)))
            })
        })
        .unwrap_or(0.0);
    let cell = q.entry(state.to_string()).or_default().entry(action.to_string()).or_insert(0.0);
    *cell += alpha * (gamma.mul_add(next_best, reward) - *cell);
}

/// Returns the greedy action for a state, or `None` when the row is empty.
#[must_use]
pub fn greedy_action(
    q: &BTreeMap<String, BTreeMap<String, f64>>,
    state: &str,
) -> Option<String> {
    q.get(state).and_then(|actions| {
        actions
            .iter()
            .fold(None::<(&String, f64)>, |best, (action, value)| match best {
                Some((_, best_value)) if best_value >= *value => best,
                _ => Some((action, *value)),
            })
            .map(|(action, _)| action.clone())
    })
}

// ============================================================================
// SECTION: Epsilon Decay
// ============================================================================

/// Decays an exploration rate by one multiplicative step.
///
/// The result is monotonically non-increasing and never drops below `min`.
#[must_use]
pub fn decay_epsilon(current: f64, decay: f64, min: f64) -> f64 {
    (current * decay).max(min)
}
