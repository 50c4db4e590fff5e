//! HTTP routes. Sampling blocks (CPU window, process scan), so it runs on
//! the blocking pool and concurrent dashboards do not wait on each other.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::actions::HostActionDispatcher;
use crate::metrics::TelemetrySnapshotBuilder;
use crate::processes::{clamp_limit, ProcessTableSampler};
use crate::state::AppState;
use crate::types::ActionResult;

const DASHBOARD: &str = include_str!("../assets/index.html");

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/summary", get(summary))
        .route("/api/processes", get(processes))
        .route("/api/processes/:pid/kill", post(kill))
        .route("/api/shutdown", post(shutdown))
        .route("/api/restart", post(restart))
        .route("/api/logoff", post(logoff))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn respond(res: ActionResult) -> Response {
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(res)).into_response()
}

fn internal(e: impl std::fmt::Display) -> Response {
    warn!("handler failed: {e}");
    respond(ActionResult::failed(500, e.to_string()))
}

async fn index() -> Html<&'static str> {
    Html(DASHBOARD)
}

async fn summary(State(state): State<AppState>) -> Response {
    let builder =
        TelemetrySnapshotBuilder::new(state.provider.clone()).cpu_interval(state.cpu_interval);
    match tokio::task::spawn_blocking(move || builder.build()).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => internal(e),
    }
}

/// `limit` that is missing or not an integer falls back to the configured
/// default; negative values clamp to zero.
pub fn resolve_limit(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(clamp_limit)
        .unwrap_or(default)
}

async fn processes(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let limit = resolve_limit(q.get("limit").map(String::as_str), state.default_limit);
    let provider = state.provider.clone();
    match tokio::task::spawn_blocking(move || {
        ProcessTableSampler::new(provider.as_ref()).sample(limit)
    })
    .await
    {
        Ok(list) => Json(list).into_response(),
        Err(e) => internal(e),
    }
}

async fn kill(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Ok(pid) = raw.parse::<u32>() else {
        return respond(ActionResult::failed(400, format!("Invalid pid {raw:?}")));
    };
    run_action(state, move |d| d.kill_process(pid)).await
}

async fn shutdown(State(state): State<AppState>) -> Response {
    run_action(state, HostActionDispatcher::shutdown).await
}

async fn restart(State(state): State<AppState>) -> Response {
    run_action(state, HostActionDispatcher::restart).await
}

async fn logoff(State(state): State<AppState>) -> Response {
    run_action(state, HostActionDispatcher::logoff).await
}

async fn run_action<F>(state: AppState, action: F) -> Response
where
    F: FnOnce(&HostActionDispatcher) -> ActionResult + Send + 'static,
{
    let dispatcher = state.actions.clone();
    match tokio::task::spawn_blocking(move || action(dispatcher.as_ref())).await {
        Ok(res) => respond(res),
        Err(e) => internal(e),
    }
}
