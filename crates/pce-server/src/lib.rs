// crates/pce-server/src/lib.rs
// ============================================================================
// Module: PCE Server Library
// Description: Public API surface for the HTTP + streaming layer.
// Purpose: Expose the router, engine assembly, and serve loop.
// Dependencies: crate::server
// ============================================================================

//! ## Overview
//! HTTP + streaming surface over the cognition engine: ingress, approvals,
//! state and coherence queries, transcript catch-up, SSE streaming, and the
//! control endpoints, with the approval sweeper wired into boot.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::AppState;
pub use server::ServerError;
pub use server::build_engine;
pub use server::router;
pub use server::serve;
