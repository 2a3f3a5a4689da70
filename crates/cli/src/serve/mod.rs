//! `akari serve` -- the HTTP JSON API over the evaluation engine.
//!
//! Exposes violations, per-resource explanations, causal chains, the
//! invariant catalog, evaluation stats, resource history, and the ingest
//! path as an async HTTP service on `axum` + `tokio`.
//!
//! Endpoints:
//! - GET  /health                      - liveness
//! - GET  /ready                       - readiness (invariants loaded)
//! - GET  /api/v1/violations           - violations, filterable by severity
//! - GET  /api/v1/violations/active    - violations only, no filter
//! - POST /api/v1/explain              - explanations for one resource
//! - GET  /api/v1/explain/resource     - results + summary for one resource
//! - GET  /api/v1/causal-chain         - an invariant and its dependency edges
//! - GET  /api/v1/history              - recorded revisions of a resource
//! - GET  /api/v1/invariants           - the registered invariant set
//! - POST /api/v1/invariants/evaluate  - run a full evaluation
//! - GET  /api/v1/stats                - violation and evaluation statistics
//! - POST /api/v1/events               - ingest state events
//!
//! All responses use Content-Type: application/json; errors are
//! `{"error": message}` objects.

mod handlers;
mod state;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use akari_engine::Engine;
use akari_storage::MemoryStore;

use self::state::AppState;
use crate::commands::load_store;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "error": message })))
}

/// Entry point for the `serve` subcommand: build the runtime, then serve
/// until ctrl-c.
pub(crate) fn run(port: u16, events: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(start(port, events))
}

async fn start(port: u16, events: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let store = match events {
        Some(path) => {
            let store = load_store(path)?;
            info!(events = store.event_count(), "preloaded state events");
            store
        }
        None => Arc::new(MemoryStore::new()),
    };
    let engine = Arc::new(Engine::with_builtin_invariants(store.clone()));
    let state = Arc::new(AppState { store, engine });

    let addr =
        std::env::var("AKARI_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{port}"));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "akari api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    // CORS is permissive: the API is read-mostly and meant for local
    // dashboards and tooling.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/api/v1/violations", get(handlers::violations))
        .route("/api/v1/violations/active", get(handlers::active_violations))
        .route("/api/v1/explain", post(handlers::explain))
        .route("/api/v1/explain/resource", get(handlers::explain_resource))
        .route("/api/v1/causal-chain", get(handlers::causal_chain))
        .route("/api/v1/history", get(handlers::history))
        .route("/api/v1/invariants", get(handlers::invariants))
        .route("/api/v1/invariants/evaluate", post(handlers::evaluate))
        .route("/api/v1/stats", get(handlers::stats))
        .route("/api/v1/events", post(handlers::ingest))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use akari_core::{StateEvent, Value};
    use akari_storage::StateStore;

    fn test_state() -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(Engine::with_builtin_invariants(store.clone()));
        Arc::new(AppState { store, engine })
    }

    fn pod_event(uid: &str, name: &str, ready: &str) -> StateEvent {
        StateEvent {
            uid: uid.to_string(),
            kind: "Pod".to_string(),
            namespace: "default".to_string(),
            name: name.to_string(),
            version: String::new(),
            timestamp: Utc::now(),
            field_diff: [
                (
                    "status.conditions[Ready].status".to_string(),
                    Value::String(ready.to_string()),
                ),
                ("spec.nodeName".to_string(), Value::String("node-1".into())),
                (
                    "status.containerStatuses[*].state.running".to_string(),
                    Value::Seq(vec![Value::Bool(ready == "True")]),
                ),
            ]
            .into_iter()
            .collect(),
            actor: "kubelet".to_string(),
            full_state: None,
        }
    }

    async fn get_json(
        state: Arc<AppState>,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(
        state: Arc<AppState>,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_and_ready() {
        let (status, body) = get_json(test_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = get_json(test_state(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
        assert_eq!(body["invariants_load"], true);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = get_json(test_state(), "/api/v1/nonsense").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn violations_filterable_by_severity() {
        let state = test_state();
        state.store.record(pod_event("pod-1", "api", "False")).unwrap();

        let (status, body) =
            get_json(state.clone(), "/api/v1/violations?severity=critical").await;
        assert_eq!(status, StatusCode::OK);
        let violations = body.as_array().unwrap();
        assert!(!violations.is_empty());
        for v in violations {
            assert_eq!(v["violated"], true);
            assert_eq!(v["severity"], "critical");
        }

        let (_, body) = get_json(state, "/api/v1/violations?severity=warning").await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_then_explain() {
        let state = test_state();

        let event = serde_json::to_value(pod_event("pod-1", "api", "False")).unwrap();
        let (status, body) = post_json(state.clone(), "/api/v1/events", event).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"], 1);

        let (status, body) = post_json(
            state,
            "/api/v1/explain",
            serde_json::json!({"kind": "Pod", "namespace": "default", "name": "api"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resource"]["uid"], "pod-1");
        assert!(!body["violations"].as_array().unwrap().is_empty());
        assert!(!body["explanations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn explain_unknown_resource_is_404() {
        let (status, body) = post_json(
            test_state(),
            "/api/v1/explain",
            serde_json::json!({"kind": "Pod", "namespace": "default", "name": "ghost"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn ingest_array_and_history() {
        let state = test_state();
        let events = serde_json::json!([
            serde_json::to_value(pod_event("pod-1", "api", "False")).unwrap(),
            serde_json::to_value(pod_event("pod-2", "worker", "True")).unwrap(),
        ]);
        let (status, body) = post_json(state.clone(), "/api/v1/events", events).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"], 2);

        let (status, body) = get_json(state, "/api/v1/history?uid=pod-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ingest_malformed_body_is_400() {
        let (status, body) = post_json(
            test_state(),
            "/api/v1/events",
            serde_json::json!({"uid": "pod-1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn causal_chain_walks_requires() {
        let (status, body) =
            get_json(test_state(), "/api/v1/causal-chain?invariant_id=pod_ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["invariant_id"], "pod_ready");
        let chain = body["chain"].as_array().unwrap();
        // The invariant itself plus its two dependency edges.
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0]["invariant_id"], "pod_ready");
    }

    #[tokio::test]
    async fn stats_report_counts() {
        let state = test_state();
        state.store.record(pod_event("pod-1", "api", "False")).unwrap();

        let (status, body) = get_json(state, "/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["total_violations"].as_u64().unwrap() > 0);
        assert!(body["by_severity"]["critical"].as_u64().unwrap() > 0);
        assert!(body["evaluation"]["total_evaluations"].as_u64().unwrap() > 0);
        assert_eq!(body["total_invariants"], 6);
    }

    #[tokio::test]
    async fn invariants_listing() {
        let (status, body) = get_json(test_state(), "/api/v1/invariants").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 6);
    }
}
