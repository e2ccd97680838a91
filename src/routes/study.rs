use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::{ok, require_user};
use crate::mastery::Choice;
use crate::response::AppError;
use crate::session::{Answer, SequencerError, SessionError, StudySession};
use crate::state::AppState;

/// Exactly one of the fields must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnswerBody {
    recall: Option<bool>,
    choice: Option<String>,
    response: Option<String>,
}

impl AnswerBody {
    fn into_answer(self) -> Result<Answer, AppError> {
        match (self.recall, self.choice, self.response) {
            (Some(correct), None, None) => Ok(Answer::Recall { correct }),
            (None, Some(raw), None) => Choice::parse(&raw)
                .map(Answer::Choice)
                .ok_or_else(|| AppError::validation(format!("choice must be A, B or C, got {raw:?}"))),
            (None, None, Some(text)) => Ok(Answer::Response(text)),
            (None, None, None) => Err(AppError::validation("answer requires recall, choice or response")),
            _ => Err(AppError::validation("give only one of recall, choice or response")),
        }
    }
}

pub(super) async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = StudySession::start(state.engine(), &user_id).await?;
    let view = session.view();
    state.sessions().insert(session).await;
    Ok((StatusCode::CREATED, ok(view)).into_response())
}

pub(super) async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = state.sessions().get(id, &user_id).await?;
    let session = session.lock().await;
    let mut view = session.view();
    if !session.phase().is_terminal() {
        view.stale = session.is_stale().await.ok();
    }
    Ok(ok(view).into_response())
}

pub(super) async fn flip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = state.sessions().get(id, &user_id).await?;
    let mut session = session.lock().await;
    session.flip()?;
    Ok(ok(session.view()).into_response())
}

pub(super) async fn answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<AnswerBody>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let answer = body.into_answer()?;
    let session = state.sessions().get(id, &user_id).await?;
    let mut session = session.lock().await;
    session.answer(answer).await?;
    Ok(ok(session.view()).into_response())
}

pub(super) async fn retry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = state.sessions().get(id, &user_id).await?;
    let mut session = session.lock().await;
    session.retry().await?;
    Ok(ok(session.view()).into_response())
}

pub(super) async fn advance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = state.sessions().get(id, &user_id).await?;
    let mut session = session.lock().await;
    session.advance()?;
    Ok(ok(session.view()).into_response())
}

pub(super) async fn abandon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let session = state.sessions().remove(id, &user_id).await?;
    let mut session = session.lock().await;
    match session.abandon() {
        Ok(()) | Err(SessionError::Sequencer(SequencerError::Finished)) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(ok(session.view()).into_response())
}
