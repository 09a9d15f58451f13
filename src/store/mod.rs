// src/store/mod.rs

//! Persistence seams.
//!
//! Handlers and the progression logic only see these traits. `postgres` backs them
//! with sqlx, `memory` keeps everything behind one mutex for local runs and tests.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptAnswer, AttemptStats, QuizAttempt, RecordedAnswer},
        leaderboard::{DailyChallenge, LeaderboardEntry, LeaderboardRow},
        quiz::{CreateQuizRequest, Question, Quiz, QuizListItem},
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Inserts the quiz and its questions in one unit. Question ids follow request order.
    async fn create_quiz(&self, creator_id: i64, req: &CreateQuizRequest) -> Result<Quiz, AppError>;

    async fn list_public_quizzes(&self) -> Result<Vec<QuizListItem>, AppError>;

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    /// Questions of a quiz, ascending by id.
    async fn get_questions_ordered_by_id(&self, quiz_id: i64) -> Result<Vec<Question>, AppError>;

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError>;

    async fn create_attempt(&self, user_id: i64, quiz_id: i64) -> Result<QuizAttempt, AppError>;

    /// All attempts of a user on a quiz with answer counts, newest first.
    async fn list_attempt_summaries(
        &self,
        user_id: i64,
        quiz_id: i64,
    ) -> Result<Vec<AttemptStats>, AppError>;

    async fn find_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
    ) -> Result<Option<AttemptAnswer>, AppError>;

    async fn answered_question_ids(&self, attempt_id: i64) -> Result<HashSet<i64>, AppError>;

    /// Insert-if-absent on (attempt, question). A newly created correct answer
    /// increments the attempt score in the same unit of work.
    async fn record_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_answer: &str,
        is_correct: bool,
    ) -> Result<RecordedAnswer, AppError>;

    async fn count_answers(&self, attempt_id: i64) -> Result<i64, AppError>;

    async fn count_correct_answers(&self, attempt_id: i64) -> Result<i64, AppError>;

    /// Marks the attempt completed and appends its leaderboard entry, atomically.
    ///
    /// Only succeeds while `completed_at` is still unset. Returns `None` when the
    /// attempt was already completed, in which case nothing is written.
    async fn complete_attempt(
        &self,
        attempt_id: i64,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i64,
    ) -> Result<Option<(QuizAttempt, LeaderboardEntry)>, AppError>;

    /// Ranking for a quiz: score descending, then time ascending.
    async fn leaderboard(&self, quiz_id: i64, limit: i64) -> Result<Vec<LeaderboardRow>, AppError>;

    /// Returns the challenge for `date`, picking a public quiz on first call.
    /// `None` when there are no public quizzes.
    async fn get_or_create_daily_challenge(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailyChallenge>, AppError>;
}

/// Values scoped to one browsing session (one login).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: Uuid, key: &str) -> Result<Option<i64>, AppError>;

    async fn set(&self, session_id: Uuid, key: &str, value: i64) -> Result<(), AppError>;
}
