// src/store/memory.rs

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::types::Json;
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

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, QuizAttempt>,
    /// Keyed by (attempt_id, question_id), which is the uniqueness rule.
    answers: BTreeMap<(i64, i64), AttemptAnswer>,
    leaderboard: Vec<LeaderboardEntry>,
    daily: BTreeMap<NaiveDate, DailyChallenge>,
    sessions: HashMap<(Uuid, String), i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Every trait method runs inside a single lock, which makes
/// each of them one atomic unit of work.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }
        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let t = self.lock()?;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn create_quiz(&self, creator_id: i64, req: &CreateQuizRequest) -> Result<Quiz, AppError> {
        let mut t = self.lock()?;
        let quiz = Quiz {
            id: t.next_id(),
            title: req.title.clone(),
            creator_id,
            is_public: req.is_public,
            is_timed: req.is_timed,
            time_limit_seconds: req.time_limit_seconds,
            created_at: Utc::now(),
        };
        t.quizzes.insert(quiz.id, quiz.clone());

        for q in &req.questions {
            let question = Question {
                id: t.next_id(),
                quiz_id: quiz.id,
                text: q.text.clone(),
                question_type: q.question_type,
                correct_answer: q.correct_answer.clone(),
                options: Json(q.options.clone()),
            };
            t.questions.insert(question.id, question);
        }

        Ok(quiz)
    }

    async fn list_public_quizzes(&self) -> Result<Vec<QuizListItem>, AppError> {
        let t = self.lock()?;
        let mut items: Vec<QuizListItem> = t
            .quizzes
            .values()
            .filter(|q| q.is_public)
            .map(|q| QuizListItem {
                quiz: q.clone(),
                question_count: t.questions.values().filter(|qs| qs.quiz_id == q.id).count()
                    as i64,
            })
            .collect();
        items.sort_by(|a, b| {
            b.quiz
                .created_at
                .cmp(&a.quiz.created_at)
                .then(b.quiz.id.cmp(&a.quiz.id))
        });
        Ok(items)
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.lock()?.quizzes.get(&id).cloned())
    }

    async fn get_questions_ordered_by_id(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        // BTreeMap iteration is already ascending by id.
        let t = self.lock()?;
        Ok(t.questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError> {
        Ok(self.lock()?.attempts.get(&id).cloned())
    }

    async fn create_attempt(&self, user_id: i64, quiz_id: i64) -> Result<QuizAttempt, AppError> {
        let mut t = self.lock()?;
        let attempt = QuizAttempt {
            id: t.next_id(),
            user_id,
            quiz_id,
            started_at: Utc::now(),
            completed_at: None,
            score: 0,
            time_taken_seconds: None,
        };
        t.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn list_attempt_summaries(
        &self,
        user_id: i64,
        quiz_id: i64,
    ) -> Result<Vec<AttemptStats>, AppError> {
        let t = self.lock()?;
        Ok(t.attempts
            .values()
            .rev()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .map(|a| {
                let answers = t.answers.range((a.id, i64::MIN)..=(a.id, i64::MAX));
                let (total, correct) = answers.fold((0, 0), |(total, correct), (_, ans)| {
                    (total + 1, correct + i64::from(ans.is_correct))
                });
                AttemptStats {
                    attempt: a.clone(),
                    total_answered: total,
                    correct_count: correct,
                }
            })
            .collect())
    }

    async fn find_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
    ) -> Result<Option<AttemptAnswer>, AppError> {
        Ok(self.lock()?.answers.get(&(attempt_id, question_id)).cloned())
    }

    async fn answered_question_ids(&self, attempt_id: i64) -> Result<HashSet<i64>, AppError> {
        let t = self.lock()?;
        Ok(t.answers
            .range((attempt_id, i64::MIN)..=(attempt_id, i64::MAX))
            .map(|((_, question_id), _)| *question_id)
            .collect())
    }

    async fn record_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_answer: &str,
        is_correct: bool,
    ) -> Result<RecordedAnswer, AppError> {
        let mut t = self.lock()?;
        if let Some(existing) = t.answers.get(&(attempt_id, question_id)) {
            return Ok(RecordedAnswer::Existing(existing.clone()));
        }
        if !t.attempts.contains_key(&attempt_id) {
            return Err(AppError::NotFound("Attempt not found".to_string()));
        }

        let answer = AttemptAnswer {
            id: t.next_id(),
            attempt_id,
            question_id,
            selected_answer: selected_answer.to_string(),
            is_correct,
        };
        t.answers.insert((attempt_id, question_id), answer.clone());
        if is_correct {
            if let Some(attempt) = t.attempts.get_mut(&attempt_id) {
                attempt.score += 1;
            }
        }
        Ok(RecordedAnswer::Created(answer))
    }

    async fn count_answers(&self, attempt_id: i64) -> Result<i64, AppError> {
        let t = self.lock()?;
        Ok(t.answers
            .range((attempt_id, i64::MIN)..=(attempt_id, i64::MAX))
            .count() as i64)
    }

    async fn count_correct_answers(&self, attempt_id: i64) -> Result<i64, AppError> {
        let t = self.lock()?;
        Ok(t.answers
            .range((attempt_id, i64::MIN)..=(attempt_id, i64::MAX))
            .filter(|(_, a)| a.is_correct)
            .count() as i64)
    }

    async fn complete_attempt(
        &self,
        attempt_id: i64,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i64,
    ) -> Result<Option<(QuizAttempt, LeaderboardEntry)>, AppError> {
        let mut t = self.lock()?;
        let Some(attempt) = t.attempts.get_mut(&attempt_id) else {
            return Err(AppError::NotFound("Attempt not found".to_string()));
        };
        if attempt.completed_at.is_some() {
            return Ok(None);
        }
        attempt.completed_at = Some(completed_at);
        attempt.time_taken_seconds.get_or_insert(time_taken_seconds);
        let attempt = attempt.clone();

        let entry = LeaderboardEntry {
            id: t.next_id(),
            quiz_id: attempt.quiz_id,
            user_id: attempt.user_id,
            attempt_id: attempt.id,
            score: attempt.score,
            time_taken_seconds: attempt.time_taken_seconds,
            created_at: completed_at,
        };
        t.leaderboard.push(entry.clone());
        Ok(Some((attempt, entry)))
    }

    async fn leaderboard(&self, quiz_id: i64, limit: i64) -> Result<Vec<LeaderboardRow>, AppError> {
        let t = self.lock()?;
        let mut entries: Vec<&LeaderboardEntry> =
            t.leaderboard.iter().filter(|e| e.quiz_id == quiz_id).collect();
        // Ties on time: entries without a time sort last, like NULLS LAST.
        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| {
                    let ta = a.time_taken_seconds.unwrap_or(i64::MAX);
                    let tb = b.time_taken_seconds.unwrap_or(i64::MAX);
                    ta.cmp(&tb)
                })
                .then(a.id.cmp(&b.id))
        });
        Ok(entries
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|e| LeaderboardRow {
                username: t
                    .users
                    .get(&e.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                score: e.score,
                time_taken_seconds: e.time_taken_seconds,
                created_at: e.created_at,
            })
            .collect())
    }

    async fn get_or_create_daily_challenge(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailyChallenge>, AppError> {
        let mut t = self.lock()?;
        if let Some(existing) = t.daily.get(&date) {
            return Ok(Some(existing.clone()));
        }
        let public: Vec<i64> = t
            .quizzes
            .values()
            .filter(|q| q.is_public)
            .map(|q| q.id)
            .collect();
        if public.is_empty() {
            return Ok(None);
        }
        // Deterministic pick: rotate through public quizzes by day.
        let index = date.num_days_from_ce().unsigned_abs() as usize % public.len();
        let challenge = DailyChallenge {
            id: t.next_id(),
            quiz_id: public[index],
            date,
        };
        t.daily.insert(date, challenge.clone());
        Ok(Some(challenge))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: Uuid, key: &str) -> Result<Option<i64>, AppError> {
        let t = self.lock()?;
        Ok(t.sessions.get(&(session_id, key.to_string())).copied())
    }

    async fn set(&self, session_id: Uuid, key: &str, value: i64) -> Result<(), AppError> {
        let mut t = self.lock()?;
        t.sessions.insert((session_id, key.to_string()), value);
        Ok(())
    }
}
