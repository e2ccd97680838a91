use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::mastery::EngineError;
use crate::services::ServiceError;
use crate::session::{SequencerError, SessionError};
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound(_) => AppError::not_found(message),
            StoreError::InvalidKey(_) => AppError::validation(message),
            StoreError::Conflict { .. } => AppError::conflict(message),
            StoreError::ReadFailure(_) | StoreError::WriteFailure(_) => {
                AppError::unavailable("STORE_UNAVAILABLE", message)
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotConfigured(_) => AppError::unavailable("SERVICE_NOT_CONFIGURED", message),
            ServiceError::Unavailable(_) | ServiceError::TimedOut(_) => {
                AppError::unavailable("SERVICE_UNAVAILABLE", message)
            }
            ServiceError::Malformed(_) => {
                json_error(StatusCode::BAD_GATEWAY, "MALFORMED_SERVICE_RESPONSE", message)
            }
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => e.into(),
            EngineError::Service(e) => e.into(),
            EngineError::EmptyHighlight => AppError::validation(err.to_string()),
        }
    }
}

impl From<SequencerError> for AppError {
    fn from(err: SequencerError) -> Self {
        let message = err.to_string();
        let code = match err {
            SequencerError::WrongAnswerKind { .. }
            | SequencerError::NoChoices
            | SequencerError::EmptyResponse => return AppError::validation(message),
            SequencerError::Finished => "SESSION_FINISHED",
            SequencerError::GradePending => "GRADE_PENDING",
            SequencerError::CommitPending => "COMMIT_PENDING",
            SequencerError::NotRevealed
            | SequencerError::NotFlippable
            | SequencerError::NotAnswered
            | SequencerError::NothingPending(_)
            | SequencerError::Transition(_) => "INVALID_SESSION_STATE",
        };
        json_error(StatusCode::CONFLICT, code, message)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Sequencer(e) => e.into(),
            SessionError::Engine(e) => e.into(),
            SessionError::Service(e) => e.into(),
            SessionError::NotFound(_) => AppError::not_found(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn service_failures_map_to_retryable_statuses() {
        let err: AppError = ServiceError::TimedOut(Duration::from_secs(1)).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");

        let err: AppError = ServiceError::Malformed("x".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn pending_items_are_conflicts() {
        let err: AppError = SessionError::Sequencer(SequencerError::GradePending).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "GRADE_PENDING");

        let err: AppError = SequencerError::EmptyResponse.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_errors_keep_their_meaning() {
        let err: AppError = EngineError::Store(StoreError::InvalidKey("a/b".into())).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let err: AppError = StoreError::WriteFailure("down".into()).into();
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
    }
}
