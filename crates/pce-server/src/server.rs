// crates/pce-server/src/server.rs
// ============================================================================
// Module: PCE HTTP Server
// Description: Ingress, approvals, state queries, control, and SSE streaming.
// Purpose: Expose the cognition engine over HTTP with consistent errors.
// Dependencies: pce-core, pce-config, pce-plugins, pce-store-sqlite, axum
// ============================================================================

//! ## Overview
//! The server exposes the pipeline over HTTP: event ingress, approval
//! resolution, state and coherence queries, the transcript catch-up endpoint,
//! and the SSE stream view over the transcript. The approval sweeper runs
//! lazily at boot before the listener binds, then on its configured interval.
//! Producer-facing errors map to 400/404/409/503; internal faults with a safe
//! default never surface as 5xx.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use pce_config::PceConfig;
use pce_core::ApprovalResolution;
use pce_core::ApprovalStatus;
use pce_core::CognitionEngine;
use pce_core::EngineError;
use pce_core::EngineSettings;
use pce_core::GateError;
use pce_core::RoverCommand;
use pce_core::SharedCognitionStore;
use pce_core::core::ApprovalId;
use pce_core::runtime::CciWeights;
use pce_plugins::AssistantSettings;
use pce_plugins::OpenRouterReplyProvider;
use pce_plugins::OpenRouterSettings;
use pce_plugins::builtin_registry;
use pce_store_sqlite::SqliteCognitionStore;
use pce_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum transcript items returned per catch-up request.
const TRANSCRIPT_PAGE_LIMIT: usize = 1_000;

/// Audit trail lines returned by the OS state endpoint.
const AUDIT_TAIL_LEN: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Store initialization failed.
    #[error("store init failed: {0}")]
    Store(String),
    /// Listener bind or serve failure.
    #[error("transport failed: {0}")]
    Transport(String),
    /// Boot-time sweep failed.
    #[error("boot sweep failed: {0}")]
    BootSweep(String),
}

/// Operator-facing API error with a mapped status code.
struct ApiError {
    /// HTTP status.
    status: StatusCode,
    /// Stable error tag.
    error: String,
    /// Human-readable detail.
    detail: String,
}

impl ApiError {
    /// Builds an error response.
    fn new(status: StatusCode, error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { status, error: error.into(), detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.error, "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::InvalidEvent(err) => {
                let tag = match &err {
                    pce_core::EplError::InvalidSchema(_) => "invalid_schema",
                    pce_core::EplError::InvalidPayload(_) => "invalid_payload",
                };
                Self::new(StatusCode::BAD_REQUEST, tag, err.to_string())
            }
            EngineError::Gate(err) => match err {
                GateError::NotFound(id) => {
                    Self::new(StatusCode::NOT_FOUND, "approval_not_found", id)
                }
                GateError::AlreadyTerminal(id) => {
                    Self::new(StatusCode::CONFLICT, "approval_already_terminal", id)
                }
                GateError::InsufficientBudget { required, available } => Self::new(
                    StatusCode::CONFLICT,
                    "insufficient_budget_for_purchase",
                    format!("required {required}, available {available}"),
                ),
                GateError::Store(err) => Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    err.to_string(),
                ),
            },
            EngineError::StateConflict(detail) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "state_conflict", detail)
            }
            EngineError::Store(err) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                err.to_string(),
            ),
        }
    }
}

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Approve and override request body.
#[derive(Debug, Deserialize)]
struct ActorNotes {
    /// Resolving operator.
    actor: String,
    /// Operator notes.
    #[serde(default)]
    notes: String,
}

/// Reject request body.
#[derive(Debug, Deserialize)]
struct ActorReason {
    /// Resolving operator.
    actor: String,
    /// Rejection reason.
    #[serde(default)]
    reason: String,
}

/// Transcript catch-up query parameters.
#[derive(Debug, Deserialize)]
struct SinceQuery {
    /// Exclusive cursor to resume after.
    #[serde(default)]
    since: u64,
}

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Cognition engine.
    engine: Arc<CognitionEngine>,
}

impl AppState {
    /// Wraps an engine for the router.
    #[must_use]
    pub const fn new(engine: Arc<CognitionEngine>) -> Self {
        Self { engine }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full API router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handle_healthz))
        .route("/events", post(handle_ingest))
        .route("/v1/events", post(handle_ingest))
        .route("/state", get(handle_state))
        .route("/cci", get(handle_cci))
        .route("/cci/history", get(handle_cci_history))
        .route("/os/approvals", get(handle_approvals))
        .route("/v1/os/approvals", get(handle_approvals))
        .route("/os/approvals/{id}/approve", post(handle_approve))
        .route("/v1/os/approvals/{id}/approve", post(handle_approve))
        .route("/os/approvals/{id}/reject", post(handle_reject))
        .route("/v1/os/approvals/{id}/reject", post(handle_reject))
        .route("/os/approvals/{id}/override", post(handle_override))
        .route("/v1/os/approvals/{id}/override", post(handle_override))
        .route("/os/robotics/state", get(handle_robotics_state))
        .route("/v1/os/state", get(handle_os_state))
        .route("/v1/os/agents/transcript", get(handle_transcript))
        .route("/v1/stream/os", get(handle_stream))
        .route("/agents/assistant/control/clear_memory", post(handle_clear_memory))
        .route("/agents/rover/control/{command}", post(handle_rover_control))
        .with_state(state)
}

// ============================================================================
// SECTION: Boot
// ============================================================================

/// Builds the engine from configuration.
///
/// # Errors
///
/// Returns [`ServerError::Store`] when the durable store cannot be opened.
pub fn build_engine(config: &PceConfig) -> Result<Arc<CognitionEngine>, ServerError> {
    let store = SqliteCognitionStore::new(&SqliteStoreConfig::at(config.state_db_path.clone()))
        .map_err(|err| ServerError::Store(err.to_string()))?;

    let reply = match &config.openrouter.api_key {
        Some(api_key) => OpenRouterReplyProvider::new(OpenRouterSettings {
            api_key: api_key.clone(),
            model: config.openrouter.model.clone(),
            base_url: config.openrouter.base_url.clone(),
            timeout: Duration::from_secs(config.openrouter.timeout_s),
            http_referer: config.openrouter.http_referer.clone(),
            x_title: config.openrouter.x_title.clone(),
        })
        .map(|provider| Arc::new(provider) as Arc<dyn pce_core::ReplyProvider>)
        .map_err(|err| {
            tracing::warn!(error = %err, "reply provider disabled");
        })
        .ok(),
        None => None,
    };

    let registry = builtin_registry(
        AssistantSettings {
            value_floor: config.assistant.value_floor,
            cci_floor: config.assistant.cci_floor,
            epsilon_start: config.assistant.epsilon_start,
            epsilon_min: config.assistant.epsilon_min,
            epsilon_decay: config.assistant.epsilon_decay,
        },
        reply,
    );

    let settings = EngineSettings {
        cci_window: config.cci.window,
        cci_weights: CciWeights {
            consistency: config.cci.weights.consistency,
            stability: config.cci.weights.stability,
            contradiction: config.cci.weights.contradiction,
            predictive: config.cci.weights.predictive,
        },
        approval_ttl_ms: i64::try_from(config.approvals.ttl_seconds)
            .unwrap_or(i64::MAX / 1_000)
            .saturating_mul(1_000),
    };
    Ok(Arc::new(CognitionEngine::new(
        SharedCognitionStore::from_store(store),
        registry,
        settings,
    )))
}

/// Runs the server until the listener fails.
///
/// The boot sweep moves expired approvals to terminal before the listener
/// binds, so no stale pending record can synthesize a completion after
/// restart. The periodic sweeper then runs on its configured interval.
///
/// # Errors
///
/// Returns [`ServerError`] on store, sweep, or transport failure.
pub async fn serve(config: PceConfig) -> Result<(), ServerError> {
    let engine = build_engine(&config)?;
    engine.sweep_expired().await.map_err(|err| ServerError::BootSweep(err.to_string()))?;

    let sweeper = Arc::clone(&engine);
    let interval = Duration::from_secs(config.approvals.sweep_interval_s);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = sweeper.sweep_expired().await {
                tracing::warn!(error = %err, "approval sweep failed");
            }
        }
    });

    let app = router(AppState::new(engine));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Transport(format!("bind failed: {err}")))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .await
        .map_err(|err| ServerError::Transport(format!("serve failed: {err}")))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness probe.
async fn handle_healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ingests one event through the pipeline.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let response = state.engine.ingest(&raw).await?;
    Ok(Json(serde_json::to_value(&response).unwrap_or(Value::Null)))
}

/// Returns the live state snapshot.
async fn handle_state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.engine.state()?;
    Ok(Json(json!({ "state": snapshot })))
}

/// Returns the current coherence index.
async fn handle_cci(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.engine.current_cci()?;
    Ok(Json(json!({ "cci": snapshot.cci })))
}

/// Returns persisted coherence snapshots.
async fn handle_cci_history(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let history = state.engine.cci_log(TRANSCRIPT_PAGE_LIMIT)?;
    let items: Vec<Value> = history
        .iter()
        .map(|snapshot| {
            json!({ "ts": snapshot.ts, "cci": snapshot.cci, "components": snapshot.components })
        })
        .collect();
    Ok(Json(json!({ "history": items })))
}

/// Lists approvals with the pending subset split out.
async fn handle_approvals(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let items = state.engine.approvals()?;
    let pending: Vec<_> =
        items.iter().filter(|record| record.status == ApprovalStatus::Pending).collect();
    Ok(Json(json!({ "pending": pending, "items": items })))
}

/// Approves a pending approval.
async fn handle_approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorNotes>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .resolve_approval(
            &ApprovalId::new(id),
            ApprovalResolution::Approve { actor: body.actor, notes: body.notes },
        )
        .await?;
    Ok(Json(serde_json::to_value(&outcome).unwrap_or(Value::Null)))
}

/// Rejects a pending approval.
async fn handle_reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorReason>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .resolve_approval(
            &ApprovalId::new(id),
            ApprovalResolution::Reject { actor: body.actor, reason: body.reason },
        )
        .await?;
    Ok(Json(serde_json::to_value(&outcome).unwrap_or(Value::Null)))
}

/// Overrides a pending approval past the budget check.
async fn handle_override(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorNotes>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .resolve_approval(
            &ApprovalId::new(id),
            ApprovalResolution::Override { actor: body.actor, notes: body.notes },
        )
        .await?;
    Ok(Json(serde_json::to_value(&outcome).unwrap_or(Value::Null)))
}

/// Returns the robotics twin.
async fn handle_robotics_state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.engine.state()?;
    Ok(Json(json!({ "robotics_twin": snapshot.pce_os().twin })))
}

/// Returns the OS operational view.
async fn handle_os_state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.engine.state()?;
    let os = snapshot.pce_os();
    let rover = snapshot.robotics().rover;
    let pending = state
        .engine
        .approvals()?
        .iter()
        .filter(|record| record.status == ApprovalStatus::Pending)
        .count();
    let cursor = state.engine.latest_cursor()?;
    let audit_tail: Vec<_> = os
        .twin
        .audit_trail
        .iter()
        .rev()
        .take(AUDIT_TAIL_LEN)
        .rev()
        .cloned()
        .collect();
    Ok(Json(json!({
        "twin_snapshot": os.twin,
        "os_metrics": {
            "events_processed": os.metrics.events_processed,
            "actions_completed": os.metrics.actions_completed,
            "approvals_created": os.metrics.approvals_created,
            "approvals_resolved": os.metrics.approvals_resolved,
            "approvals_pending": pending,
            "transcript_cursor": cursor,
        },
        "policy_state": {
            "epsilon": rover.epsilon,
            "running": rover.running,
            "q_states": rover.q.len(),
            "stats": rover.stats,
        },
        "last_n_audit_trail": audit_tail,
    })))
}

/// Returns transcript items after the given cursor.
async fn handle_transcript(
    State(state): State<AppState>,
    Query(query): Query<SinceQuery>,
) -> Result<Json<Value>, ApiError> {
    let items = state.engine.transcript_since(query.since, TRANSCRIPT_PAGE_LIMIT)?;
    let cursor = items.last().map_or(query.since, |item| item.cursor);
    Ok(Json(json!({ "cursor": cursor, "items": items })))
}

/// Streams transcript items over SSE.
///
/// Each consumer maintains its own cursor: on reconnect the client catches up
/// via the transcript endpoint, then resumes the stream from live items.
async fn handle_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.engine.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|item| {
        let item = item.ok()?;
        let event = Event::default().event(item.kind.sse_event());
        match event.json_data(&item) {
            Ok(event) => Some(Ok(event)),
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Clears all assistant session memory.
async fn handle_clear_memory(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.engine.clear_assistant_memory().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Applies a rover control command.
async fn handle_rover_control(
    State(state): State<AppState>,
    Path(command): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(command) = RoverCommand::parse(&command) else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "unknown_command",
            format!("unknown rover command: {command}"),
        ));
    };
    let policy = state.engine.rover_control(command).await?;
    Ok(Json(json!({
        "status": "ok",
        "policy": {
            "epsilon": policy.epsilon,
            "running": policy.running,
            "q_states": policy.q.len(),
            "stats": policy.stats,
        },
    })))
}
