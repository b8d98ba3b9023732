// crates/pce-core/src/core/time.rs
// ============================================================================
// Module: PCE Time Model
// Description: Canonical wall-clock timestamps for events, actions, and logs.
// Purpose: Provide a single millisecond-precision time value across records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The engine stamps every normalized event with server wall-clock time in
//! unix milliseconds. Stamps are assigned exactly once by the event validator
//! and flow unchanged through actions, approvals, coherence snapshots, and
//! transcript items.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch millisecond timestamp.
///
/// # Invariants
/// - Stamped once at validation time and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Reads the current server wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the number of milliseconds elapsed since an earlier timestamp.
    #[must_use]
    pub const fn millis_since(&self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns this timestamp shifted forward by the given milliseconds.
    #[must_use]
    pub const fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}
