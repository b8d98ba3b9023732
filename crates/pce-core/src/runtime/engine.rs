// crates/pce-core/src/runtime/engine.rs
// ============================================================================
// Module: PCE Pipeline Engine
// Description: Seven-stage cognition pipeline and approval resolution.
// Purpose: Turn normalized events into auditable decisions with persistence.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The engine is the single canonical execution path for the cognition core.
//! All API surfaces must call into these methods to preserve invariance and
//! auditability. One event is validated, integrated, persisted, scored,
//! measured for coherence, deliberated, then gated or executed and adapted,
//! with a transcript item per stage and a coherence snapshot after every
//! completed action. Pipeline execution is serialized through one writer
//! lock; events with the same correlation are processed in ingress order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::core::ACTION_HISTORY_CAP;
use crate::core::ActionId;
use crate::core::ActionMetadata;
use crate::core::ActionPlan;
use crate::core::ApprovalId;
use crate::core::ApprovalRecord;
use crate::core::ApprovalResolution;
use crate::core::ApprovalStatus;
use crate::core::CCI_HISTORY_CAP;
use crate::core::CciComponents;
use crate::core::CciSnapshot;
use crate::core::CompletedAction;
use crate::core::CorrelationId;
use crate::core::DecisionId;
use crate::core::EventId;
use crate::core::EventPayload;
use crate::core::KEY_ACTION_HISTORY;
use crate::core::KEY_CCI_HISTORY;
use crate::core::NormalizedEvent;
use crate::core::RoverPolicy;
use crate::core::StateSnapshot;
use crate::core::Timestamp;
use crate::core::TranscriptEntry;
use crate::core::TranscriptItem;
use crate::core::TranscriptKind;
use crate::interfaces::CognitionStore;
use crate::interfaces::DecisionInputs;
use crate::interfaces::MergeOutcome;
use crate::interfaces::SharedCognitionStore;
use crate::interfaces::StoreError;
use crate::runtime::approvals::ApprovalGate;
use crate::runtime::approvals::GateError;
use crate::runtime::broadcast::TranscriptBroadcaster;
use crate::runtime::coherence::CciWeights;
use crate::runtime::coherence::CoherenceEngine;
use crate::runtime::coherence::DEFAULT_CCI_WINDOW;
use crate::runtime::integrator::StateIntegrator;
use crate::runtime::registry::PluginRegistry;
use crate::runtime::validator::EplError;
use crate::runtime::validator::EventValidator;
use crate::runtime::value::ValueEvaluator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Domain whose financial actions pass through the approval gate.
pub const GATED_DOMAIN: &str = "os.robotics";

/// Risk labels that force approval inside the gated domain.
const GATED_RISKS: [&str; 2] = ["HIGH", "MEDIUM"];

/// Action types that touch financial twin fields.
const FINANCIAL_ACTIONS: [&str; 2] = ["purchase", "budget_commit"];

/// Source label for events synthesized by the approval gate.
const GATE_SOURCE: &str = "pce.approval_gate";

// ============================================================================
// SECTION: Engine Settings
// ============================================================================

/// Tunable engine settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Coherence sliding window W.
    pub cci_window: usize,
    /// Fixed coherence weights.
    pub cci_weights: CciWeights,
    /// Approval TTL in milliseconds.
    pub approval_ttl_ms: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cci_window: DEFAULT_CCI_WINDOW,
            cci_weights: CciWeights::default(),
            approval_ttl_ms: crate::runtime::approvals::DEFAULT_APPROVAL_TTL_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline execution errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Event failed validation; surfaced to the producer as HTTP 400.
    #[error(transparent)]
    InvalidEvent(#[from] EplError),
    /// Approval gate error.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// Writer retried once and still could not persist the snapshot.
    #[error("state_conflict: {0}")]
    StateConflict(String),
    /// Store error outside the conflict path.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Response produced for one ingested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// Server-assigned event identifier.
    pub event_id: EventId,
    /// Value-adherence score in [0, 1].
    pub value_score: f64,
    /// Coherence index used for the response.
    pub cci: f64,
    /// Coherence component breakdown.
    pub cci_components: CciComponents,
    /// Action type of the resulting plan.
    pub action_type: String,
    /// Resulting action: completed record, or plan with pending status.
    pub action: Value,
    /// Plan metadata including the explanation bag.
    pub metadata: ActionMetadata,
    /// Whether execution succeeded (pending plans report true).
    pub success: bool,
    /// Current exploration rate for adaptive domains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    /// Session memory surfaced for assistant events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_learning: Option<Value>,
    /// Set when the plan suspended behind the approval gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,
    /// Identifier of the created pending approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
}

/// Result of resolving an approval, including the follow-up pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    /// Resolved approval record.
    pub approval: ApprovalRecord,
    /// Response of the synthesized completion event, when one was enqueued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup: Option<PipelineResponse>,
}

/// Rover control commands accepted by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoverCommand {
    /// Start the rover loop.
    Start,
    /// Stop the rover loop.
    Stop,
    /// Reset the rover position and episode state.
    Reset,
    /// Zero the episode statistics.
    ResetStats,
    /// Clear the learned Q table.
    ClearPolicy,
}

impl RoverCommand {
    /// Parses a control path segment into a command.
    #[must_use]
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "reset" => Some(Self::Reset),
            "reset_stats" => Some(Self::ResetStats),
            "clear_policy" => Some(Self::ClearPolicy),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Cognition pipeline engine.
pub struct CognitionEngine {
    /// Durable store owning all persisted entities.
    store: SharedCognitionStore,
    /// Per-domain plugin registry, read-mostly after boot.
    registry: PluginRegistry,
    /// Event processing layer.
    validator: EventValidator,
    /// Internal state integrator.
    integrator: StateIntegrator,
    /// Value evaluation layer.
    evaluator: ValueEvaluator,
    /// Coherence engine.
    coherence: CoherenceEngine,
    /// Approval gate.
    gate: ApprovalGate,
    /// Live transcript fan-out.
    broadcaster: TranscriptBroadcaster,
    /// Writer lock serializing everything from integration onward.
    writer: tokio::sync::Mutex<()>,
}

impl CognitionEngine {
    /// Creates an engine over a store and plugin registry.
    #[must_use]
    pub fn new(
        store: SharedCognitionStore,
        registry: PluginRegistry,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            validator: EventValidator::builtin(),
            integrator: StateIntegrator::new(),
            evaluator: ValueEvaluator::new(),
            coherence: CoherenceEngine::new(settings.cci_window, settings.cci_weights),
            gate: ApprovalGate::new(settings.approval_ttl_ms),
            broadcaster: TranscriptBroadcaster::new(),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Ingress
    // ------------------------------------------------------------------

    /// Validates and processes one raw envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidEvent`] for schema failures (HTTP 400),
    /// [`EngineError::StateConflict`] after a failed retry (HTTP 503), and
    /// store errors otherwise.
    pub async fn ingest(&self, raw: &Value) -> Result<PipelineResponse, EngineError> {
        let event = self.validator.normalize(raw)?;
        self.process(event).await
    }

    /// Processes an already-normalized event through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when persistence fails mid-pipeline.
    #[allow(
        clippy::too_many_lines,
        reason = "Maintain a single linear flow for ordered stage execution and auditability."
    )]
    pub async fn process(&self, event: NormalizedEvent) -> Result<PipelineResponse, EngineError> {
        let correlation = event.correlation();
        let decision_id = DecisionId::random();
        let domain = event.payload.domain.clone();
        tracing::debug!(event_id = %event.event_id, event_type = %event.event_type, "pipeline start");

        let _writer = self.writer.lock().await;

        let state = self.store.load_state()?;
        self.store.append_event(&event)?;
        self.record(
            TranscriptKind::EventIngested,
            None,
            json!({
                "event_id": event.event_id,
                "event_type": event.event_type,
                "source": event.source,
            }),
            &correlation,
            None,
            event.ts,
        )?;

        let MergeOutcome { state: candidate, mut violations } =
            self.integrator.integrate(&self.registry, state, &event);

        let assessment = self.evaluator.evaluate(&self.registry, &candidate, &event);
        let value_score = assessment.score;
        violations.extend(assessment.violations);

        let log = self.store.recent_actions(self.coherence.window())?;
        let cci_before = self.coherence.compute(&log, event.ts);

        let inputs = DecisionInputs {
            value_score,
            violations: &violations,
            cci: &cci_before,
            event: &event,
        };
        let (mut candidate, mut plan) = match self.registry.decide_for(&domain) {
            Some(plugin) => match plugin.decide(candidate.clone(), inputs).await {
                Ok(decision) => (decision.state, decision.plan),
                Err(err) => {
                    tracing::warn!(domain = %domain, error = %err, "decision plugin failed");
                    let mut plan =
                        ActionPlan::observe(domain.clone(), "decision plugin failed; observing");
                    plan.metadata.explain_de("override_reason", json!("plugin_error"));
                    (candidate, plan)
                }
            },
            None => {
                (candidate, ActionPlan::observe(domain.clone(), "no decision capability registered"))
            }
        };
        if approval_required(&plan) {
            plan.requires_approval = true;
        }

        self.record(
            TranscriptKind::ActionsProposed,
            None,
            json!({
                "action_type": plan.action_type,
                "priority": plan.priority,
                "requires_approval": plan.requires_approval,
            }),
            &correlation,
            Some(decision_id.clone()),
            event.ts,
        )?;
        if let Some(reply) = plan.metadata.de_entry("reply").cloned() {
            self.record(
                TranscriptKind::AgentMessage,
                Some(domain.clone()),
                json!({ "reply": reply }),
                &correlation,
                Some(decision_id.clone()),
                event.ts,
            )?;
        }

        let mut os = candidate.pce_os();
        os.metrics.events_processed += 1;
        if plan.requires_approval {
            os.metrics.approvals_created += 1;
            candidate.set_pce_os(&os);
            return self.suspend_behind_gate(
                candidate,
                plan,
                &event,
                decision_id,
                &correlation,
                value_score,
                &cci_before,
            );
        }
        candidate.set_pce_os(&os);

        let observed = self
            .registry
            .probe_for(&plan.domain)
            .and_then(|probe| probe.observe_impact(&candidate, &plan))
            .unwrap_or(plan.expected_impact);
        let completed = CompletedAction {
            action_id: ActionId::random(),
            decision_id: decision_id.clone(),
            plan: plan.clone(),
            observed_impact: observed,
            success: true,
            violations: violations.clone(),
            completed_at: event.ts,
        };

        if event.is_feedback()
            && let Some(adapt) = self.registry.adapt_for(&domain)
        {
            match adapt.adapt(candidate.clone(), &event) {
                Ok(next) => candidate = next,
                Err(err) => {
                    tracing::warn!(domain = %domain, error = %err, "adaptation failed");
                }
            }
        }

        self.store.append_action(&completed)?;
        let mut os = candidate.pce_os();
        os.metrics.actions_completed += 1;
        candidate.set_pce_os(&os);
        candidate.push_ring(
            KEY_ACTION_HISTORY,
            serde_json::to_value(&completed).unwrap_or(Value::Null),
            ACTION_HISTORY_CAP,
        );

        let log = self.store.recent_actions(self.coherence.window())?;
        let cci_after = self.coherence.compute(&log, event.ts);
        self.store.append_cci(&cci_after)?;
        candidate.push_ring(
            KEY_CCI_HISTORY,
            serde_json::to_value(&cci_after).unwrap_or(Value::Null),
            CCI_HISTORY_CAP,
        );

        self.save_state_with_retry(&candidate)?;
        self.record(
            TranscriptKind::StateUpdated,
            None,
            json!({ "value_score": value_score, "cci": cci_after.cci }),
            &correlation,
            Some(decision_id),
            event.ts,
        )?;
        tracing::debug!(event_id = %event.event_id, cci = cci_after.cci, "pipeline complete");

        Ok(PipelineResponse {
            event_id: event.event_id.clone(),
            value_score,
            cci: cci_after.cci,
            cci_components: cci_after.components,
            action_type: completed.plan.action_type.clone(),
            action: serde_json::to_value(&completed).unwrap_or(Value::Null),
            metadata: completed.plan.metadata.clone(),
            success: completed.success,
            epsilon: response_epsilon(&candidate, &event),
            assistant_learning: assistant_learning(&candidate, &event.payload),
            requires_approval: None,
            approval_id: None,
        })
    }

    /// Creates the pending approval and finishes the gated pipeline branch.
    #[allow(
        clippy::too_many_arguments,
        reason = "The gated branch consumes every stage output accumulated so far."
    )]
    fn suspend_behind_gate(
        &self,
        candidate: StateSnapshot,
        plan: ActionPlan,
        event: &NormalizedEvent,
        decision_id: DecisionId,
        correlation: &CorrelationId,
        value_score: f64,
        cci: &CciSnapshot,
    ) -> Result<PipelineResponse, EngineError> {
        let approval = self.gate.create(
            &self.store,
            plan.clone(),
            decision_id.clone(),
            Some(correlation.clone()),
            event.ts,
        )?;
        self.record(
            TranscriptKind::ApprovalCreated,
            None,
            json!({
                "approval_id": approval.approval_id,
                "projected_cost": approval.projected_cost,
                "risk": approval.risk,
            }),
            correlation,
            Some(decision_id.clone()),
            event.ts,
        )?;
        self.save_state_with_retry(&candidate)?;
        self.record(
            TranscriptKind::StateUpdated,
            None,
            json!({ "value_score": value_score, "pending_approval": approval.approval_id }),
            correlation,
            Some(decision_id),
            event.ts,
        )?;

        let mut action = serde_json::to_value(&plan).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut action {
            map.insert("status".to_string(), json!("pending"));
        }
        Ok(PipelineResponse {
            event_id: event.event_id.clone(),
            value_score,
            cci: cci.cci,
            cci_components: cci.components.clone(),
            action_type: plan.action_type.clone(),
            action,
            metadata: plan.metadata.clone(),
            success: true,
            epsilon: response_epsilon(&candidate, event),
            assistant_learning: assistant_learning(&candidate, &event.payload),
            requires_approval: Some(true),
            approval_id: Some(approval.approval_id),
        })
    }

    // ------------------------------------------------------------------
    // Approvals
    // ------------------------------------------------------------------

    /// Resolves a pending approval and enqueues the synthesized follow-up.
    ///
    /// The follow-up completion or rejection event is processed on a separate
    /// pipeline invocation after the resolution commits.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] variants mapped through [`EngineError::Gate`]:
    /// not-found (404), already-terminal (409), insufficient budget (409,
    /// record stays pending).
    pub async fn resolve_approval(
        &self,
        id: &ApprovalId,
        resolution: ApprovalResolution,
    ) -> Result<ApprovalOutcome, EngineError> {
        let now = Timestamp::now();
        let record = {
            let _writer = self.writer.lock().await;
            let mut state = self.store.load_state()?;
            let record = self.gate.resolve(&self.store, &state, id, &resolution, now)?;
            let mut os = state.pce_os();
            os.metrics.approvals_resolved += 1;
            state.set_pce_os(&os);
            self.save_state_with_retry(&state)?;
            let correlation = record
                .correlation_id
                .clone()
                .unwrap_or_else(|| CorrelationId::new(record.approval_id.as_str()));
            self.record(
                TranscriptKind::ApprovalUpdated,
                None,
                json!({
                    "approval_id": record.approval_id,
                    "status": record.status.label(),
                    "actor": record.actor,
                }),
                &correlation,
                Some(record.decision_id.clone()),
                now,
            )?;
            record
        };

        let followup = match record.status {
            ApprovalStatus::Approved | ApprovalStatus::Overridden => {
                Some(self.process(synthesize_followup(&record, "completed", now)).await?)
            }
            ApprovalStatus::Rejected => {
                Some(self.process(synthesize_followup(&record, "rejected", now)).await?)
            }
            ApprovalStatus::Pending | ApprovalStatus::Expired => None,
        };
        Ok(ApprovalOutcome { approval: record, followup })
    }

    /// Expires pending approvals past their TTL.
    ///
    /// Runs lazily at boot before any new ingress, then on the sweeper
    /// interval. No action executes for an expired approval.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the sweep fails to persist.
    pub async fn sweep_expired(&self) -> Result<Vec<ApprovalRecord>, EngineError> {
        let now = Timestamp::now();
        let _writer = self.writer.lock().await;
        let expired = self.gate.sweep(&self.store, now)?;
        for record in &expired {
            let correlation = record
                .correlation_id
                .clone()
                .unwrap_or_else(|| CorrelationId::new(record.approval_id.as_str()));
            self.record(
                TranscriptKind::ApprovalUpdated,
                None,
                json!({ "approval_id": record.approval_id, "status": "expired" }),
                &correlation,
                Some(record.decision_id.clone()),
                now,
            )?;
        }
        Ok(expired)
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Clears all per-session assistant memory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when persisting fails.
    pub async fn clear_assistant_memory(&self) -> Result<(), EngineError> {
        let _writer = self.writer.lock().await;
        let mut state = self.store.load_state()?;
        let mut assistant = state.assistant();
        assistant.sessions.clear();
        state.set_assistant(&assistant);
        self.save_state_with_retry(&state)
    }

    /// Applies a rover control command and returns the updated policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when persisting fails.
    pub async fn rover_control(&self, command: RoverCommand) -> Result<RoverPolicy, EngineError> {
        let _writer = self.writer.lock().await;
        let mut state = self.store.load_state()?;
        let mut robotics = state.robotics();
        match command {
            RoverCommand::Start => robotics.rover.running = true,
            RoverCommand::Stop => robotics.rover.running = false,
            RoverCommand::Reset => {
                robotics.rover.last_state = None;
                robotics.rover.last_action = None;
            }
            RoverCommand::ResetStats => robotics.rover.stats = crate::core::RoverStats::default(),
            RoverCommand::ClearPolicy => robotics.rover.q.clear(),
        }
        let policy = robotics.rover.clone();
        state.set_robotics(&robotics);
        self.save_state_with_retry(&state)?;
        Ok(policy)
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Returns the live state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when loading fails.
    pub fn state(&self) -> Result<StateSnapshot, EngineError> {
        Ok(self.store.load_state()?)
    }

    /// Computes the current coherence snapshot from the action log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the action log cannot be read.
    pub fn current_cci(&self) -> Result<CciSnapshot, EngineError> {
        let log = self.store.recent_actions(self.coherence.window())?;
        Ok(self.coherence.compute(&log, Timestamp::now()))
    }

    /// Returns persisted coherence snapshots, oldest-first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails.
    pub fn cci_log(&self, limit: usize) -> Result<Vec<CciSnapshot>, EngineError> {
        Ok(self.store.cci_history(limit)?)
    }

    /// Returns all approval records ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails.
    pub fn approvals(&self) -> Result<Vec<ApprovalRecord>, EngineError> {
        Ok(self.store.approvals()?)
    }

    /// Returns transcript items with cursor strictly greater than `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails.
    pub fn transcript_since(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<Vec<TranscriptItem>, EngineError> {
        Ok(self.store.transcript_since(cursor, limit)?)
    }

    /// Returns the latest assigned transcript cursor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails.
    pub fn latest_cursor(&self) -> Result<u64, EngineError> {
        Ok(self.store.latest_cursor()?)
    }

    /// Subscribes to transcript items committed after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptItem> {
        self.broadcaster.subscribe()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Appends a transcript entry, publishes it, and returns nothing.
    fn record(
        &self,
        kind: TranscriptKind,
        agent: Option<String>,
        payload: Value,
        correlation: &CorrelationId,
        decision_id: Option<DecisionId>,
        ts: Timestamp,
    ) -> Result<(), EngineError> {
        let entry = TranscriptEntry {
            ts,
            kind,
            agent,
            payload,
            correlation_id: correlation.clone(),
            decision_id,
        };
        let item = self.store.append_transcript(&entry)?;
        self.broadcaster.publish(item);
        Ok(())
    }

    /// Persists the snapshot, retrying once on write conflict.
    fn save_state_with_retry(&self, state: &StateSnapshot) -> Result<(), EngineError> {
        match self.store.save_state(state) {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => match self.store.save_state(state) {
                Ok(()) => Ok(()),
                Err(StoreError::Conflict(message)) => Err(EngineError::StateConflict(message)),
                Err(err) => Err(EngineError::Store(err)),
            },
            Err(err) => Err(EngineError::Store(err)),
        }
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Returns true when the gate must intercept the plan.
///
/// Approval is required inside the gated domain when the action touches a
/// financial twin field or declares elevated risk.
fn approval_required(plan: &ActionPlan) -> bool {
    if plan.domain != GATED_DOMAIN {
        return false;
    }
    if FINANCIAL_ACTIONS.contains(&plan.action_type.as_str()) {
        return true;
    }
    plan.metadata.risk.as_deref().is_some_and(|risk| GATED_RISKS.contains(&risk))
}

/// Builds the internal event synthesized by a terminal approval.
///
/// The event is constructed already normalized; the gate is a trusted internal
/// producer and its stamps follow the same assign-once rule.
fn synthesize_followup(record: &ApprovalRecord, suffix: &str, now: Timestamp) -> NormalizedEvent {
    let mut extra = serde_json::Map::new();
    let item = record
        .action
        .metadata
        .subject
        .clone()
        .unwrap_or_else(|| record.action.action_type.clone());
    extra.insert("item".to_string(), json!(item));
    extra.insert("cost".to_string(), json!(record.projected_cost));
    extra.insert("approval_id".to_string(), json!(record.approval_id));
    if record.override_applied {
        extra.insert("override".to_string(), json!(true));
    }
    NormalizedEvent {
        event_id: EventId::random(),
        event_type: format!("{}.{suffix}", record.action.action_type),
        source: GATE_SOURCE.to_string(),
        ts: now,
        payload: EventPayload {
            domain: record.action.domain.clone(),
            session_id: None,
            correlation_id: record.correlation_id.clone(),
            tags: std::collections::BTreeSet::new(),
            extra,
        },
    }
}

/// Returns the exploration rate surfaced in the response, when relevant.
fn response_epsilon(state: &StateSnapshot, event: &NormalizedEvent) -> Option<f64> {
    match event.payload.domain.as_str() {
        "assistant" => state.assistant().epsilon,
        GATED_DOMAIN => matches!(event.event_type.as_str(), "robot_telemetry" | "reward.rover.v1")
            .then(|| state.robotics().rover.epsilon),
        _ => None,
    }
}

/// Returns the session memory surfaced for assistant events.
fn assistant_learning(state: &StateSnapshot, payload: &EventPayload) -> Option<Value> {
    if payload.domain != "assistant" {
        return None;
    }
    let session_id = payload.session_id.as_ref()?;
    let assistant = state.assistant();
    let memory = assistant.sessions.get(session_id)?;
    Some(json!({ "preferences": memory.preferences, "avoid": memory.avoid }))
}
