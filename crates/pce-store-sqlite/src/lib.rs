// crates/pce-store-sqlite/src/lib.rs
// ============================================================================
// Module: PCE SQLite Store Library
// Description: Public API surface for the durable cognition store.
// Purpose: Expose the SQLite-backed CognitionStore implementation.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Durable single-file persistence for the cognition engine: state snapshot,
//! event/action/coherence logs, approvals, and the cursor-assigning
//! transcript, all in one `SQLite` database with WAL enabled.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteCognitionStore;
pub use store::SqliteJournalMode;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
