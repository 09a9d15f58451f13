// src/handlers/play.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    error::AppError,
    models::attempt::{PlayAction, PlayForm, PlayQuery},
    progression::PlayOutcome,
    state::AppState,
    utils::jwt::Claims,
};

/// Shows the current question of the active attempt, starting one if needed.
///
/// `?question_id=` jumps to a specific question of the quiz.
pub async fn show(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<PlayQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let view = state
        .progression()
        .show(user_id, quiz_id, claims.sid, query.question_id)
        .await?;

    tracing::debug!(
        username = %claims.username,
        quiz_id,
        attempt_id = view.attempt_id,
        completed = view.completed,
        "play view"
    );
    Ok(Json(view))
}

/// Submits an answer, or starts a retake when `retake` is set.
///
/// Once the last question is answered this answers with 303 See Other pointing
/// back at the play URL, which then renders the completion view.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(form): Json<PlayForm>,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    let action = PlayAction::try_from(form)?;

    let outcome = state
        .progression()
        .handle_post(user_id, quiz_id, claims.sid, action)
        .await?;

    Ok(match outcome {
        PlayOutcome::Render(view) => Json(view).into_response(),
        PlayOutcome::RedirectToCompletion { quiz_id } => {
            tracing::info!(username = %claims.username, quiz_id, "quiz finished");
            Redirect::to(&format!("/api/quizzes/{}/play", quiz_id)).into_response()
        }
    })
}
