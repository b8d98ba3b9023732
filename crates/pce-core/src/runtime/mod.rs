// crates/pce-core/src/runtime/mod.rs
// ============================================================================
// Module: PCE Runtime
// Description: Pipeline stages, plugin registry, approval gate, and stores.
// Purpose: Provide the executable cognition pipeline over the core types.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime wires the seven pipeline stages together: validation,
//! integration, value scoring, coherence, deliberation, gating/execution, and
//! adaptation, plus the transcript broadcaster and the in-memory store used by
//! tests.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod adaptation;
pub mod approvals;
pub mod broadcast;
pub mod coherence;
pub mod engine;
pub mod integrator;
pub mod registry;
pub mod store;
pub mod validator;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adaptation::SESSION_MEMORY_CAP;
pub use adaptation::decay_epsilon;
pub use adaptation::greedy_action;
pub use adaptation::q_update;
pub use adaptation::remember;
pub use approvals::ApprovalGate;
pub use approvals::BUDGET_GATED_ACTIONS;
pub use approvals::DEFAULT_APPROVAL_TTL_MS;
pub use approvals::GateError;
pub use broadcast::TranscriptBroadcaster;
pub use coherence::CciWeights;
pub use coherence::CoherenceEngine;
pub use coherence::DEFAULT_CCI_WINDOW;
pub use coherence::MIN_QUALIFYING_ACTIONS;
pub use engine::ApprovalOutcome;
pub use engine::CognitionEngine;
pub use engine::EngineError;
pub use engine::EngineSettings;
pub use engine::GATED_DOMAIN;
pub use engine::PipelineResponse;
pub use engine::RoverCommand;
pub use integrator::StateIntegrator;
pub use registry::DomainPlugins;
pub use registry::PluginRegistry;
pub use store::InMemoryCognitionStore;
pub use validator::EplError;
pub use validator::EventValidator;
pub use validator::FieldKind;
pub use validator::FieldSpec;
pub use validator::PayloadSchema;
pub use validator::SchemaRegistry;
pub use value::ValueEvaluator;
pub use value::default_assessment;
