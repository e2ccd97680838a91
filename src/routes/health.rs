use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::config::StoreBackend;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    store: &'static str,
    definition_service: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    start_time: String,
    uptime: u64,
    active_sessions: usize,
}

async fn root(State(state): State<AppState>) -> Response {
    let llm = state.llm_available();
    Json(HealthResponse {
        status: if llm { "ok" } else { "degraded" },
        timestamp: now_iso(),
        store: match state.store_backend() {
            StoreBackend::Memory => "memory",
            StoreBackend::Rtdb => "rtdb",
        },
        definition_service: if llm { "configured" } else { "not_configured" },
    })
    .into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let started: DateTime<Utc> = state.started_at_system().into();
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        start_time: started.to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.uptime_seconds(),
        active_sessions: state.sessions().active_count().await,
    })
    .into_response()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
