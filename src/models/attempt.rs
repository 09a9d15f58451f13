// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Longest answer text that can be stored.
pub const MAX_ANSWER_LEN: usize = 200;

/// Represents the 'quiz_attempts' table in the database.
///
/// `score` only ever grows. `completed_at` and `time_taken_seconds` are set once,
/// when the last unanswered question is answered.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub score: i32,
    pub time_taken_seconds: Option<i64>,
}

impl QuizAttempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Represents the 'attempt_answers' table. Unique per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_answer: String,
    pub is_correct: bool,
}

/// Result of an insert-if-absent on (attempt, question).
#[derive(Debug, Clone)]
pub enum RecordedAnswer {
    /// A new row was written (and the score bumped if it was correct).
    Created(AttemptAnswer),
    /// The question had already been answered in this attempt; nothing changed.
    Existing(AttemptAnswer),
}

impl RecordedAnswer {
    pub fn answer(&self) -> &AttemptAnswer {
        match self {
            RecordedAnswer::Created(a) | RecordedAnswer::Existing(a) => a,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RecordedAnswer::Existing(_))
    }
}

/// Attempt row joined with its answer counts.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptStats {
    #[sqlx(flatten)]
    pub attempt: QuizAttempt,
    pub total_answered: i64,
    pub correct_count: i64,
}

/// Entry of the "previous attempts" list in the play view.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub attempt: QuizAttempt,
    pub total_answered: i64,
    pub correct_count: i64,
    pub accuracy: f64,
}

/// Body of `POST /api/quizzes/{id}/play`.
///
/// Converted into a [`PlayAction`] before it reaches the progression logic.
#[derive(Debug, Default, Deserialize)]
pub struct PlayForm {
    pub question_id: Option<i64>,
    pub selected_answer: Option<String>,
    #[serde(default)]
    pub retake: bool,
}

/// Query string of `GET /api/quizzes/{id}/play`.
#[derive(Debug, Default, Deserialize)]
pub struct PlayQuery {
    pub question_id: Option<i64>,
}

/// A validated play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayAction {
    Retake,
    Answer {
        question_id: Option<i64>,
        /// `None` when the form carried no (or only a blank) answer.
        selected: Option<String>,
    },
}

impl TryFrom<PlayForm> for PlayAction {
    type Error = AppError;

    fn try_from(form: PlayForm) -> Result<Self, Self::Error> {
        if form.retake {
            return Ok(PlayAction::Retake);
        }
        let selected = form
            .selected_answer
            .filter(|s| !s.trim().is_empty());
        if selected.as_ref().is_some_and(|s| s.chars().count() > MAX_ANSWER_LEN) {
            return Err(AppError::BadRequest(format!(
                "selected_answer must be at most {} characters",
                MAX_ANSWER_LEN
            )));
        }
        Ok(PlayAction::Answer {
            question_id: form.question_id,
            selected,
        })
    }
}
