// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::LEADERBOARD_LIMIT,
    error::AppError,
    models::{
        leaderboard::DailyChallengeResponse,
        quiz::{CreateQuizRequest, PublicQuestion, QuizDetail},
    },
    state::AppState,
    utils::{html::clean_html, jwt::Claims},
};

/// Lists public quizzes, newest first.
pub async fn list_quizzes(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.quizzes.list_public_quizzes().await?;
    Ok(Json(quizzes))
}

/// Creates a quiz together with its questions.
///
/// Title and question text are sanitized before storage; answers and options are
/// kept verbatim so they still compare against what players type.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    payload.title = clean_html(&payload.title);
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title is empty after sanitization".to_string()));
    }
    for question in &mut payload.questions {
        question.text = clean_html(&question.text);
        if question.text.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Question text is empty after sanitization".to_string(),
            ));
        }
    }

    let user_id = claims.user_id()?;
    let quiz = state.quizzes.create_quiz(user_id, &payload).await?;

    tracing::info!(
        quiz_id = quiz.id,
        creator_id = user_id,
        creator = %claims.username,
        questions = payload.questions.len(),
        "quiz created"
    );
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Quiz detail with its questions (answers hidden).
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state
        .quizzes
        .get_quiz(id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let questions = state
        .quizzes
        .get_questions_ordered_by_id(quiz.id)
        .await?
        .iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(QuizDetail { quiz, questions }))
}

/// Ranking for one quiz: highest score first, faster times break ties.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if state.quizzes.get_quiz(id).await?.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let leaderboard = state.quizzes.leaderboard(id, LEADERBOARD_LIMIT).await?;
    Ok(Json(leaderboard))
}

/// Today's challenge. The quiz is picked on the first request of the (UTC) day.
pub async fn daily_challenge(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();

    let challenge = state
        .quizzes
        .get_or_create_daily_challenge(today)
        .await?
        .ok_or(AppError::NotFound("No quiz available for a daily challenge".to_string()))?;

    let quiz = state
        .quizzes
        .get_quiz(challenge.quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(DailyChallengeResponse {
        date: challenge.date,
        quiz,
    }))
}
