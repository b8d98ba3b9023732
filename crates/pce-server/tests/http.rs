// crates/pce-server/tests/http.rs
// ============================================================================
// Module: HTTP Surface Tests
// Description: End-to-end scenarios against an ephemeral-port server.
// ============================================================================
//! ## Overview
//! Boots the full stack (sqlite store, builtin plugins, engine, router) on an
//! ephemeral port and drives it with a real HTTP client: purchase approve and
//! insufficient-budget paths, coherence cold start and warm-up, transcript
//! catch-up ordering, and producer-facing error codes.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use pce_core::CognitionEngine;
use pce_core::EngineSettings;
use pce_core::SharedCognitionStore;
use pce_plugins::AssistantSettings;
use pce_plugins::builtin_registry;
use pce_server::AppState;
use pce_server::router;
use pce_store_sqlite::SqliteCognitionStore;
use pce_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Running test server handle.
struct TestServer {
    /// Base URL of the bound listener.
    base: String,
    /// Temp directory holding the database (kept alive for the test).
    _dir: TempDir,
}

/// Boots the full stack on an ephemeral port.
async fn spawn_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let store =
        SqliteCognitionStore::new(&SqliteStoreConfig::at(dir.path().join("pce_state.db")))
            .unwrap();
    let registry = builtin_registry(AssistantSettings::default(), None);
    let engine = Arc::new(CognitionEngine::new(
        SharedCognitionStore::from_store(store),
        registry,
        EngineSettings::default(),
    ));
    let app = router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestServer { base: format!("http://{addr}"), _dir: dir }
}

/// Posts an event envelope and returns the parsed response.
async fn post_event(server: &TestServer, body: Value) -> (reqwest::StatusCode, Value) {
    let client = reqwest::Client::new();
    let response =
        client.post(format!("{}/events", server.base)).json(&body).send().await.unwrap();
    let status = response.status();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

/// Fetches a JSON endpoint.
async fn get_json(server: &TestServer, path: &str) -> Value {
    reqwest::get(format!("{}{path}", server.base)).await.unwrap().json().await.unwrap()
}

/// Builds the budget update envelope.
fn budget_update(amount: f64) -> Value {
    json!({
        "event_type": "budget.updated",
        "source": "sim",
        "payload": { "domain": "os.robotics", "amount": amount }
    })
}

/// Builds the purchase request envelope from the approve scenario.
fn purchase_request() -> Value {
    json!({
        "event_type": "purchase.requested",
        "source": "sim",
        "payload": {
            "domain": "os.robotics",
            "correlation_id": "c1",
            "item": "lidar",
            "projected_cost": 240.0,
            "risk_level": "MEDIUM"
        }
    })
}

/// Scenario: purchase approve path debits the twin.
#[tokio::test]
async fn purchase_approve_path() {
    let server = spawn_server().await;
    post_event(&server, budget_update(500.0)).await;

    let (status, body) = post_event(&server, purchase_request()).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["requires_approval"], json!(true));
    let approval_id = body["approval_id"].as_str().unwrap().to_string();

    // Twin untouched while pending.
    let twin = get_json(&server, "/os/robotics/state").await;
    assert_eq!(twin["robotics_twin"]["budget_remaining"], json!(500.0));
    assert_eq!(twin["robotics_twin"]["purchase_history"].as_array().unwrap().len(), 0);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/os/approvals/{approval_id}/approve", server.base))
        .json(&json!({ "actor": "op", "notes": "ok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let twin = get_json(&server, "/os/robotics/state").await;
    assert_eq!(twin["robotics_twin"]["budget_remaining"], json!(260.0));
    assert_eq!(twin["robotics_twin"]["purchase_history"].as_array().unwrap().len(), 1);
}

/// Scenario: insufficient budget keeps the approval pending.
#[tokio::test]
async fn insufficient_budget_keeps_pending() {
    let server = spawn_server().await;
    post_event(&server, budget_update(100.0)).await;

    let (_, body) = post_event(&server, purchase_request()).await;
    let approval_id = body["approval_id"].as_str().unwrap().to_string();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/os/approvals/{approval_id}/approve", server.base))
        .json(&json!({ "actor": "op", "notes": "ok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], json!("insufficient_budget_for_purchase"));

    let approvals = get_json(&server, "/os/approvals").await;
    assert_eq!(approvals["pending"].as_array().unwrap().len(), 1);
    let twin = get_json(&server, "/os/robotics/state").await;
    assert_eq!(twin["robotics_twin"]["budget_remaining"], json!(100.0));
}

/// Scenario: override bypasses the budget check.
#[tokio::test]
async fn override_bypasses_budget() {
    let server = spawn_server().await;
    post_event(&server, budget_update(100.0)).await;
    let (_, body) = post_event(&server, purchase_request()).await;
    let approval_id = body["approval_id"].as_str().unwrap().to_string();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/os/approvals/{approval_id}/override", server.base))
        .json(&json!({ "actor": "op", "notes": "force" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let twin = get_json(&server, "/os/robotics/state").await;
    assert_eq!(twin["robotics_twin"]["budget_remaining"], json!(-140.0));
}

/// Scenario: coherence cold start then warm-up past 0.7.
#[tokio::test]
async fn coherence_cold_start_and_warmup() {
    let server = spawn_server().await;

    let cold = get_json(&server, "/cci").await;
    assert_eq!(cold["cci"], json!(0.5));

    for index in 0..3 {
        let (status, _) = post_event(
            &server,
            json!({
                "event_type": "observation.assistant.v1",
                "source": "chat-ui",
                "payload": {
                    "domain": "assistant",
                    "session_id": "s1",
                    "text": format!("turn {index}")
                }
            }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::OK);
    }

    let warm = get_json(&server, "/cci").await;
    assert!(warm["cci"].as_f64().unwrap() > 0.7, "cci was {}", warm["cci"]);

    // Snapshots landing in the same millisecond collapse onto one row, so
    // only presence and bounds are asserted here.
    let history = get_json(&server, "/cci/history").await;
    let len = history["history"].as_array().unwrap().len();
    assert!((1..=3).contains(&len), "history length {len}");
}

/// Scenario: transcript catch-up returns exactly the missed items in order.
#[tokio::test]
async fn transcript_catchup_in_cursor_order() {
    let server = spawn_server().await;
    post_event(&server, budget_update(500.0)).await;

    let first = get_json(&server, "/v1/os/agents/transcript?since=0").await;
    let seen = first["cursor"].as_u64().unwrap();
    assert!(seen > 0);

    post_event(&server, budget_update(600.0)).await;
    post_event(&server, budget_update(700.0)).await;

    let catchup = get_json(&server, &format!("/v1/os/agents/transcript?since={seen}")).await;
    let cursors: Vec<u64> = catchup["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["cursor"].as_u64().unwrap())
        .collect();
    assert!(!cursors.is_empty());
    assert_eq!(cursors[0], seen + 1);
    for window in cursors.windows(2) {
        assert_eq!(window[1], window[0] + 1);
    }
}

/// Verifies invalid envelopes surface HTTP 400 with the error taxonomy tag.
#[tokio::test]
async fn invalid_schema_maps_to_bad_request() {
    let server = spawn_server().await;
    let (status, body) =
        post_event(&server, json!({ "source": "sim", "payload": {} })).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_schema"));

    let (status, body) = post_event(
        &server,
        json!({
            "event_type": "purchase.requested",
            "source": "sim",
            "payload": { "domain": "os.robotics", "item": "lidar" }
        }),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_payload"));
}

/// Verifies unknown approvals surface HTTP 404.
#[tokio::test]
async fn unknown_approval_maps_to_not_found() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/os/approvals/missing/approve", server.base))
        .json(&json!({ "actor": "op", "notes": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

/// Verifies assistant feedback surfaces in the next response's learning bag.
#[tokio::test]
async fn feedback_surfaces_in_assistant_learning() {
    let server = spawn_server().await;
    post_event(
        &server,
        json!({
            "event_type": "feedback.assistant.v1",
            "source": "chat-ui",
            "payload": {
                "domain": "assistant",
                "session_id": "s1",
                "reward": -1.0,
                "notes": "não seja prolixo"
            }
        }),
    )
    .await;

    let (_, body) = post_event(
        &server,
        json!({
            "event_type": "observation.assistant.v1",
            "source": "chat-ui",
            "payload": { "domain": "assistant", "session_id": "s1", "text": "resuma" }
        }),
    )
    .await;
    let avoid = body["assistant_learning"]["avoid"].as_array().unwrap();
    assert_eq!(avoid, &vec![json!("não seja prolixo")]);
    assert_eq!(
        body["metadata"]["explain"]["de"]["avoid_hints"],
        json!(["não seja prolixo"])
    );
}

/// Verifies the OS state endpoint exposes metrics and policy state.
#[tokio::test]
async fn os_state_exposes_metrics() {
    let server = spawn_server().await;
    post_event(&server, budget_update(500.0)).await;

    let body = get_json(&server, "/v1/os/state").await;
    assert_eq!(body["os_metrics"]["events_processed"], json!(1));
    assert_eq!(body["os_metrics"]["actions_completed"], json!(1));
    assert!(body["policy_state"]["epsilon"].as_f64().is_some());
    assert!(body["last_n_audit_trail"].as_array().is_some());
}

/// Verifies rover controls flip the policy flags.
#[tokio::test]
async fn rover_controls_flip_policy() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/agents/rover/control/start", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["policy"]["running"], json!(true));

    let response = client
        .post(format!("{}/agents/rover/control/bogus", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}
