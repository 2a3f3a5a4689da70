//! HTTP route handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use akari_core::{EvaluationContext, StateEvent};
use akari_engine::{explain as explanation, ViolationResult};
use akari_storage::StateStore;

use super::json_error;
use super::state::AppState;

const DEFAULT_VIOLATION_LIMIT: usize = 100;
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Fallback handler for unmatched routes.
pub(crate) async fn not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "time": Utc::now(),
    }))
}

/// GET /ready
pub(crate) async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ready": true,
        "invariants_load": !state.engine.invariants().is_empty(),
    }))
}

#[derive(Deserialize)]
pub(crate) struct ViolationsQuery {
    severity: Option<String>,
    limit: Option<usize>,
}

/// GET /api/v1/violations?severity=critical&limit=50
pub(crate) async fn violations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViolationsQuery>,
) -> impl IntoResponse {
    let mut violations: Vec<ViolationResult> = state
        .engine
        .evaluate_all()
        .into_iter()
        .filter(|result| result.violated)
        .collect();

    if let Some(severity) = &query.severity {
        violations.retain(|result| result.severity.as_str() == severity);
    }
    violations.truncate(query.limit.unwrap_or(DEFAULT_VIOLATION_LIMIT));

    Json(violations)
}

/// GET /api/v1/violations/active
pub(crate) async fn active_violations(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let active: Vec<ViolationResult> = state
        .engine
        .evaluate_all()
        .into_iter()
        .filter(|result| result.violated)
        .collect();
    Json(active)
}

#[derive(Deserialize)]
pub(crate) struct ExplainRequest {
    kind: String,
    #[serde(default)]
    namespace: String,
    name: String,
}

fn find_resource(state: &AppState, kind: &str, namespace: &str, name: &str) -> Option<StateEvent> {
    state
        .store
        .get_latest_by_kind(kind)
        .into_iter()
        .find(|event| event.namespace == namespace && event.name == name)
}

/// POST /api/v1/explain
/// Body: {"kind": "Pod", "namespace": "default", "name": "api-pod"}
pub(crate) async fn explain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExplainRequest>,
) -> impl IntoResponse {
    let Some(target) = find_resource(&state, &request.kind, &request.namespace, &request.name)
    else {
        return json_error(StatusCode::NOT_FOUND, "resource not found").into_response();
    };

    let uid = target.uid.clone();
    let ctx = EvaluationContext::new(target);
    let violations: Vec<ViolationResult> = state
        .engine
        .evaluate_resource(&ctx)
        .into_iter()
        .filter(|result| result.violated)
        .collect();

    Json(serde_json::json!({
        "resource": {
            "kind": request.kind,
            "namespace": request.namespace,
            "name": request.name,
            "uid": uid,
        },
        "violations": violations,
        "explanations": explanation::format_explanations(&violations),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub(crate) struct ExplainResourceQuery {
    kind: Option<String>,
    #[serde(default)]
    namespace: String,
    name: Option<String>,
}

/// GET /api/v1/explain/resource?kind=Pod&namespace=default&name=api-pod
pub(crate) async fn explain_resource(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExplainResourceQuery>,
) -> impl IntoResponse {
    let (Some(kind), Some(name)) = (query.kind, query.name) else {
        return json_error(StatusCode::BAD_REQUEST, "kind and name are required")
            .into_response();
    };
    let Some(target) = find_resource(&state, &kind, &query.namespace, &name) else {
        return json_error(StatusCode::NOT_FOUND, "resource not found").into_response();
    };

    let uid = target.uid.clone();
    let ctx = EvaluationContext::new(target);
    let results = state.engine.evaluate_resource(&ctx);

    Json(serde_json::json!({
        "resource": {
            "kind": kind,
            "namespace": query.namespace,
            "name": name,
            "uid": uid,
        },
        "violations": results,
        "summary": explanation::summarize(&results),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub(crate) struct CausalChainQuery {
    invariant_id: Option<String>,
}

/// GET /api/v1/causal-chain?invariant_id=pod_ready
pub(crate) async fn causal_chain(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CausalChainQuery>,
) -> impl IntoResponse {
    let Some(invariant_id) = query.invariant_id else {
        return json_error(StatusCode::BAD_REQUEST, "invariant_id is required")
            .into_response();
    };

    let mut chain = Vec::new();
    if let Some(inv) = state.engine.invariant(&invariant_id) {
        chain.push(serde_json::json!({
            "invariant_id": inv.id,
            "description": inv.description,
            "severity": inv.severity,
            "actor": inv.responsibility.primary,
        }));
        for req in &inv.requires {
            if let Some(dep) = state.engine.invariant(&req.invariant) {
                chain.push(serde_json::json!({
                    "invariant_id": dep.id,
                    "description": dep.description,
                    "severity": dep.severity,
                    "actor": dep.responsibility.primary,
                    "relation": req.scope.relation,
                }));
            }
        }
    }

    Json(serde_json::json!({
        "invariant_id": invariant_id,
        "depth": chain.len(),
        "chain": chain,
    }))
    .into_response()
}

#[derive(Deserialize)]
pub(crate) struct HistoryQuery {
    uid: Option<String>,
    limit: Option<usize>,
}

/// GET /api/v1/history?uid=pod-123&limit=20
pub(crate) async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let Some(uid) = query.uid else {
        return json_error(StatusCode::BAD_REQUEST, "uid is required").into_response();
    };

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let mut revisions = state.store.history(&uid);
    revisions.reverse(); // newest first
    revisions.truncate(limit);

    Json(revisions).into_response()
}

/// GET /api/v1/invariants
pub(crate) async fn invariants(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.invariants())
}

/// POST /api/v1/invariants/evaluate
pub(crate) async fn evaluate(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let violations: Vec<ViolationResult> = state
        .engine
        .evaluate_all()
        .into_iter()
        .filter(|result| result.violated)
        .collect();

    Json(serde_json::json!({
        "evaluated_at": Utc::now(),
        "total_count": violations.len(),
        "violations": violations,
    }))
}

/// GET /api/v1/stats
pub(crate) async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let results = state.engine.evaluate_all();

    let mut by_severity: BTreeMap<&str, usize> =
        BTreeMap::from([("critical", 0), ("degraded", 0), ("warning", 0)]);
    let mut by_actor: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_violations = 0usize;

    for result in &results {
        if result.violated {
            total_violations += 1;
            *by_severity.entry(result.severity.as_str()).or_insert(0) += 1;
            *by_actor.entry(result.responsible_actor.clone()).or_insert(0) += 1;
        }
    }

    Json(serde_json::json!({
        "total_invariants": state.engine.invariants().len(),
        "total_violations": total_violations,
        "by_severity": by_severity,
        "by_actor": by_actor,
        "evaluation": state.engine.stats(),
    }))
}

/// POST /api/v1/events -- ingest one state event or an array of them.
pub(crate) async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let events: Vec<StateEvent> = if body.is_array() {
        match serde_json::from_value(body) {
            Ok(events) => events,
            Err(err) => {
                return json_error(StatusCode::BAD_REQUEST, &format!("invalid events: {err}"))
                    .into_response()
            }
        }
    } else {
        match serde_json::from_value(body) {
            Ok(event) => vec![event],
            Err(err) => {
                return json_error(StatusCode::BAD_REQUEST, &format!("invalid event: {err}"))
                    .into_response()
            }
        }
    };

    let mut recorded = 0usize;
    for event in events {
        if let Err(err) = state.store.record(event) {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("record failed after {recorded} events: {err}"),
            )
            .into_response();
        }
        recorded += 1;
    }

    Json(serde_json::json!({ "recorded": recorded })).into_response()
}
