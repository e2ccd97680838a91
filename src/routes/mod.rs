mod health;
mod study;
mod terms;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Serialize;

use crate::response::{json_error, AppError};
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> axum::Json<SuccessResponse<T>> {
    axum::Json(SuccessResponse { success: true, data })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .route("/api/terms", get(terms::list).fallback(fallback_handler))
        .route("/api/terms/lookup", post(terms::lookup).fallback(fallback_handler))
        .route("/api/terms/:key", delete(terms::remove).fallback(fallback_handler))
        .route("/api/study/sessions", post(study::start).fallback(fallback_handler))
        .route(
            "/api/study/sessions/:id",
            get(study::show).delete(study::abandon).fallback(fallback_handler),
        )
        .route("/api/study/sessions/:id/flip", post(study::flip).fallback(fallback_handler))
        .route("/api/study/sessions/:id/answer", post(study::answer).fallback(fallback_handler))
        .route("/api/study/sessions/:id/retry", post(study::retry).fallback(fallback_handler))
        .route("/api/study/sessions/:id/advance", post(study::advance).fallback(fallback_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Identity comes from the `X-User-Id` header set by the client.
fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("missing X-User-Id header"))
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}
