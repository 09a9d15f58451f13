// src/store/postgres.rs

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptAnswer, AttemptStats, QuizAttempt, RecordedAnswer},
        leaderboard::{DailyChallenge, LeaderboardEntry, LeaderboardRow},
        quiz::{CreateQuizRequest, Question, Quiz, QuizListItem},
        user::User,
    },
    store::{QuizRepository, SessionStore, UserRepository},
};

const QUIZ_COLUMNS: &str =
    "id, title, creator_id, is_public, is_timed, time_limit_seconds, created_at";
const QUESTION_COLUMNS: &str = "id, quiz_id, text, question_type, correct_answer, options";
const ATTEMPT_COLUMNS: &str =
    "id, user_id, quiz_id, started_at, completed_at, score, time_taken_seconds";
const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, selected_answer, is_correct";

/// sqlx-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl QuizRepository for PgStore {
    async fn create_quiz(&self, creator_id: i64, req: &CreateQuizRequest) -> Result<Quiz, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes (title, creator_id, is_public, is_timed, time_limit_seconds)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(&req.title)
        .bind(creator_id)
        .bind(req.is_public)
        .bind(req.is_timed)
        .bind(req.time_limit_seconds)
        .fetch_one(&mut *tx)
        .await?;

        for question in &req.questions {
            sqlx::query(
                r#"
                INSERT INTO questions (quiz_id, text, question_type, correct_answer, options)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(quiz.id)
            .bind(&question.text)
            .bind(question.question_type.as_code())
            .bind(&question.correct_answer)
            .bind(Json(&question.options))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(quiz)
    }

    async fn list_public_quizzes(&self) -> Result<Vec<QuizListItem>, AppError> {
        let quizzes = sqlx::query_as::<_, QuizListItem>(
            r#"
            SELECT
                q.id, q.title, q.creator_id, q.is_public, q.is_timed,
                q.time_limit_seconds, q.created_at,
                (SELECT COUNT(*) FROM questions qs WHERE qs.quiz_id = q.id) AS question_count
            FROM quizzes q
            WHERE q.is_public
            ORDER BY q.created_at DESC, q.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quiz)
    }

    async fn get_questions_ordered_by_id(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY id ASC"
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn create_attempt(&self, user_id: i64, quiz_id: i64) -> Result<QuizAttempt, AppError> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
            "INSERT INTO quiz_attempts (user_id, quiz_id) VALUES ($1, $2) RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn list_attempt_summaries(
        &self,
        user_id: i64,
        quiz_id: i64,
    ) -> Result<Vec<AttemptStats>, AppError> {
        let rows = sqlx::query_as::<_, AttemptStats>(
            r#"
            SELECT
                a.id, a.user_id, a.quiz_id, a.started_at, a.completed_at,
                a.score, a.time_taken_seconds,
                COUNT(aa.id) AS total_answered,
                COUNT(aa.id) FILTER (WHERE aa.is_correct) AS correct_count
            FROM quiz_attempts a
            LEFT JOIN attempt_answers aa ON aa.attempt_id = a.id
            WHERE a.user_id = $1 AND a.quiz_id = $2
            GROUP BY a.id
            ORDER BY a.id DESC
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
    ) -> Result<Option<AttemptAnswer>, AppError> {
        let answer = sqlx::query_as::<_, AttemptAnswer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM attempt_answers WHERE attempt_id = $1 AND question_id = $2"
        ))
        .bind(attempt_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(answer)
    }

    async fn answered_question_ids(&self, attempt_id: i64) -> Result<HashSet<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT question_id FROM attempt_answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn record_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_answer: &str,
        is_correct: bool,
    ) -> Result<RecordedAnswer, AppError> {
        let mut tx = self.pool.begin().await?;

        // The unique (attempt_id, question_id) constraint serializes duplicate submissions.
        let inserted = sqlx::query_as::<_, AttemptAnswer>(&format!(
            r#"
            INSERT INTO attempt_answers (attempt_id, question_id, selected_answer, is_correct)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (attempt_id, question_id) DO NOTHING
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(question_id)
        .bind(selected_answer)
        .bind(is_correct)
        .fetch_optional(&mut *tx)
        .await?;

        let recorded = match inserted {
            Some(answer) => {
                if answer.is_correct {
                    sqlx::query("UPDATE quiz_attempts SET score = score + 1 WHERE id = $1")
                        .bind(attempt_id)
                        .execute(&mut *tx)
                        .await?;
                }
                RecordedAnswer::Created(answer)
            }
            None => {
                let existing = sqlx::query_as::<_, AttemptAnswer>(&format!(
                    "SELECT {ANSWER_COLUMNS} FROM attempt_answers WHERE attempt_id = $1 AND question_id = $2"
                ))
                .bind(attempt_id)
                .bind(question_id)
                .fetch_one(&mut *tx)
                .await?;
                RecordedAnswer::Existing(existing)
            }
        };

        tx.commit().await?;
        Ok(recorded)
    }

    async fn count_answers(&self, attempt_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_correct_answers(&self, attempt_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1 AND is_correct",
        )
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn complete_attempt(
        &self,
        attempt_id: i64,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i64,
    ) -> Result<Option<(QuizAttempt, LeaderboardEntry)>, AppError> {
        let mut tx = self.pool.begin().await?;

        let completed = sqlx::query_as::<_, QuizAttempt>(&format!(
            r#"
            UPDATE quiz_attempts
            SET completed_at = $2,
                time_taken_seconds = COALESCE(time_taken_seconds, $3)
            WHERE id = $1 AND completed_at IS NULL
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(completed_at)
        .bind(time_taken_seconds)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(attempt) = completed else {
            // Lost the race (or a replay): someone else already finalized it.
            return Ok(None);
        };

        let entry = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            INSERT INTO leaderboard_entries (quiz_id, user_id, attempt_id, score, time_taken_seconds)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, quiz_id, user_id, attempt_id, score, time_taken_seconds, created_at
            "#,
        )
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(attempt.id)
        .bind(attempt.score)
        .bind(attempt.time_taken_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((attempt, entry)))
    }

    async fn leaderboard(&self, quiz_id: i64, limit: i64) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT u.username, e.score, e.time_taken_seconds, e.created_at
            FROM leaderboard_entries e
            JOIN users u ON e.user_id = u.id
            WHERE e.quiz_id = $1
            ORDER BY e.score DESC, e.time_taken_seconds ASC NULLS LAST, e.id ASC
            LIMIT $2
            "#,
        )
        .bind(quiz_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_or_create_daily_challenge(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailyChallenge>, AppError> {
        sqlx::query(
            r#"
            INSERT INTO daily_challenges (quiz_id, date)
            SELECT pick.id, $1::date
            FROM (SELECT id FROM quizzes WHERE is_public ORDER BY RANDOM() LIMIT 1) pick
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(date)
        .execute(&self.pool)
        .await?;

        let challenge = sqlx::query_as::<_, DailyChallenge>(
            "SELECT id, quiz_id, date FROM daily_challenges WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(challenge)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, session_id: Uuid, key: &str) -> Result<Option<i64>, AppError> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM session_values WHERE session_id = $1 AND key = $2",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, session_id: Uuid, key: &str, value: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_values (session_id, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id, key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
