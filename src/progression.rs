// src/progression.rs

//! Quiz attempt progression.
//!
//! Walks a user through a quiz one question per request. The only state carried
//! between requests is the attempt id stored in the browsing session under
//! `quiz_{quiz_id}_attempt_id`; everything else is derived from the attempt's
//! recorded answers.
//!
//! An attempt is `InProgress` until the answer that leaves no unanswered question
//! is recorded. At that point it is completed exactly once: `completed_at` and
//! `time_taken_seconds` are set and a single leaderboard entry is appended.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSummary, PlayAction, QuizAttempt, RecordedAnswer},
        quiz::{PublicQuestion, Question, Quiz},
    },
    store::{QuizRepository, SessionStore},
};

/// Session slot holding the active attempt id for one quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPointer {
    pub session_id: Uuid,
    pub key: String,
}

impl AttemptPointer {
    pub fn for_quiz(session_id: Uuid, quiz_id: i64) -> Self {
        Self {
            session_id,
            key: format!("quiz_{}_attempt_id", quiz_id),
        }
    }
}

/// Percentage of correct answers, rounded to two decimals. Zero when nothing was answered.
pub fn accuracy(correct: i64, answered: i64) -> f64 {
    if answered == 0 {
        return 0.0;
    }
    let pct = correct as f64 / answered as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Case-insensitive comparison after trimming surrounding whitespace.
pub fn answers_match(selected: &str, correct: &str) -> bool {
    selected.trim().to_lowercase() == correct.trim().to_lowercase()
}

/// First question, in id order, that has not been answered.
pub fn next_unanswered<'q>(questions: &'q [Question], answered: &HashSet<i64>) -> Option<&'q Question> {
    questions.iter().find(|q| !answered.contains(&q.id))
}

/// 1-based position of a question within the quiz.
pub fn position_of(questions: &[Question], question_id: i64) -> Option<usize> {
    questions.iter().position(|q| q.id == question_id).map(|i| i + 1)
}

/// Where an attempt stands when a question is about to be shown.
#[derive(Debug, Clone)]
pub enum Resolution {
    Question(Question),
    Completed { accuracy: f64 },
}

/// Outcome of recording one answer.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The attempt has no unanswered questions left; the caller should redirect
    /// to the completion view.
    Completed,
    Next(Feedback),
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub question_id: i64,
    pub is_correct: bool,
    /// Only revealed once an answer has been recorded for the question.
    pub correct_answer: Option<String>,
    pub selected_answer: Option<String>,
    /// False when the submission carried no answer and nothing was stored.
    pub recorded: bool,
    /// True when the question had already been answered in this attempt.
    pub duplicate: bool,
    pub accuracy: f64,
    pub next_question_id: Option<i64>,
}

/// Render model for the play endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PlayView {
    pub quiz: Quiz,
    pub attempt_id: i64,
    pub question: Option<PublicQuestion>,
    pub completed: bool,
    pub feedback: Option<Feedback>,
    pub score: i32,
    pub accuracy: f64,
    pub next_question_id: Option<i64>,
    pub question_index: Option<usize>,
    pub total_questions: usize,
    pub time_taken_seconds: Option<i64>,
    pub previous_attempts: Vec<AttemptSummary>,
}

/// What a POST produced.
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    Render(PlayView),
    /// The attempt just finished (or was already finished); show the completion view.
    RedirectToCompletion { quiz_id: i64 },
}

pub struct QuizAttemptProgression<'a> {
    quizzes: &'a dyn QuizRepository,
    sessions: &'a dyn SessionStore,
}

impl<'a> QuizAttemptProgression<'a> {
    pub fn new(quizzes: &'a dyn QuizRepository, sessions: &'a dyn SessionStore) -> Self {
        Self { quizzes, sessions }
    }

    /// Reuses the attempt the session points at, or starts a new one.
    ///
    /// A pointer to an attempt that no longer exists, or that belongs to another
    /// user or quiz, counts as no pointer at all.
    pub async fn start_or_resume_attempt(
        &self,
        user_id: i64,
        quiz: &Quiz,
        pointer: &AttemptPointer,
    ) -> Result<QuizAttempt, AppError> {
        if let Some(attempt_id) = self.sessions.get(pointer.session_id, &pointer.key).await? {
            match self.quizzes.get_attempt(attempt_id).await? {
                Some(attempt) if attempt.user_id == user_id && attempt.quiz_id == quiz.id => {
                    tracing::debug!(attempt_id, quiz_id = quiz.id, "resuming attempt");
                    return Ok(attempt);
                }
                _ => {
                    tracing::info!(attempt_id, quiz_id = quiz.id, "stale attempt pointer, starting over");
                }
            }
        }

        self.begin_attempt(user_id, quiz, pointer).await
    }

    /// Starts a fresh attempt and repoints the session at it. Earlier attempts are kept.
    pub async fn retake(
        &self,
        user_id: i64,
        quiz: &Quiz,
        pointer: &AttemptPointer,
    ) -> Result<QuizAttempt, AppError> {
        tracing::info!(user_id, quiz_id = quiz.id, "retake requested");
        self.begin_attempt(user_id, quiz, pointer).await
    }

    async fn begin_attempt(
        &self,
        user_id: i64,
        quiz: &Quiz,
        pointer: &AttemptPointer,
    ) -> Result<QuizAttempt, AppError> {
        let attempt = self.quizzes.create_attempt(user_id, quiz.id).await?;
        self.sessions
            .set(pointer.session_id, &pointer.key, attempt.id)
            .await?;
        tracing::info!(attempt_id = attempt.id, user_id, quiz_id = quiz.id, "attempt started");
        Ok(attempt)
    }

    /// Picks the question to show: the requested one if it belongs to the quiz,
    /// otherwise the first unanswered one.
    pub async fn resolve_current_question(
        &self,
        attempt: &QuizAttempt,
        questions: &[Question],
        requested_question_id: Option<i64>,
    ) -> Result<Resolution, AppError> {
        if let Some(requested) = requested_question_id
            .and_then(|id| questions.iter().find(|q| q.id == id))
        {
            return Ok(Resolution::Question(requested.clone()));
        }

        let answered = self.quizzes.answered_question_ids(attempt.id).await?;
        match next_unanswered(questions, &answered) {
            Some(question) => Ok(Resolution::Question(question.clone())),
            None => Ok(Resolution::Completed {
                accuracy: self.running_accuracy(attempt.id).await?,
            }),
        }
    }

    /// Records an answer for `question` and advances the attempt.
    ///
    /// Re-submitting an already answered question changes nothing and reports the
    /// correctness stored the first time.
    pub async fn submit_answer(
        &self,
        attempt: &QuizAttempt,
        questions: &[Question],
        question: &Question,
        selected_answer: &str,
    ) -> Result<SubmitOutcome, AppError> {
        let recorded = match self.quizzes.find_answer(attempt.id, question.id).await? {
            Some(existing) => {
                tracing::debug!(attempt_id = attempt.id, question_id = question.id, "duplicate submission");
                RecordedAnswer::Existing(existing)
            }
            None => {
                let is_correct = answers_match(selected_answer, &question.correct_answer);
                self.quizzes
                    .record_answer(attempt.id, question.id, selected_answer, is_correct)
                    .await?
            }
        };

        let accuracy = self.running_accuracy(attempt.id).await?;
        let answered = self.quizzes.answered_question_ids(attempt.id).await?;

        let Some(next) = next_unanswered(questions, &answered) else {
            self.finalize(attempt).await?;
            return Ok(SubmitOutcome::Completed);
        };

        Ok(SubmitOutcome::Next(Feedback {
            question_id: question.id,
            is_correct: recorded.answer().is_correct,
            correct_answer: Some(question.correct_answer.clone()),
            selected_answer: Some(recorded.answer().selected_answer.clone()),
            recorded: true,
            duplicate: recorded.is_duplicate(),
            accuracy,
            next_question_id: Some(next.id),
        }))
    }

    /// Performs the `InProgress -> Completed` transition once.
    ///
    /// Returns the attempt as stored after the call.
    async fn finalize(&self, attempt: &QuizAttempt) -> Result<QuizAttempt, AppError> {
        let was_completed = attempt.completed_at.is_some();
        if was_completed {
            return Ok(attempt.clone());
        }

        let completed_at = Utc::now();
        let time_taken = attempt
            .time_taken_seconds
            .unwrap_or_else(|| (completed_at - attempt.started_at).num_seconds().max(0));

        match self
            .quizzes
            .complete_attempt(attempt.id, completed_at, time_taken)
            .await?
        {
            Some((done, entry)) => {
                tracing::info!(
                    attempt_id = done.id,
                    score = done.score,
                    time_taken_seconds = ?done.time_taken_seconds,
                    leaderboard_entry = entry.id,
                    "attempt completed"
                );
                Ok(done)
            }
            None => {
                // A concurrent request finished it between our read and the update.
                self.quizzes
                    .get_attempt(attempt.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))
            }
        }
    }

    async fn running_accuracy(&self, attempt_id: i64) -> Result<f64, AppError> {
        let answered = self.quizzes.count_answers(attempt_id).await?;
        let correct = self.quizzes.count_correct_answers(attempt_id).await?;
        Ok(accuracy(correct, answered))
    }

    async fn load_quiz(&self, quiz_id: i64) -> Result<(Quiz, Vec<Question>), AppError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
        let questions = self.quizzes.get_questions_ordered_by_id(quiz.id).await?;
        Ok((quiz, questions))
    }

    /// GET: resume (or start) the attempt and show the current question, or the
    /// completion view when nothing is left.
    pub async fn show(
        &self,
        user_id: i64,
        quiz_id: i64,
        session_id: Uuid,
        requested_question_id: Option<i64>,
    ) -> Result<PlayView, AppError> {
        let (quiz, questions) = self.load_quiz(quiz_id).await?;
        let pointer = AttemptPointer::for_quiz(session_id, quiz.id);
        let attempt = self.start_or_resume_attempt(user_id, &quiz, &pointer).await?;

        self.render(user_id, quiz, &questions, attempt, requested_question_id, None)
            .await
    }

    /// POST: submit an answer or retake.
    pub async fn handle_post(
        &self,
        user_id: i64,
        quiz_id: i64,
        session_id: Uuid,
        action: PlayAction,
    ) -> Result<PlayOutcome, AppError> {
        let (quiz, questions) = self.load_quiz(quiz_id).await?;
        let pointer = AttemptPointer::for_quiz(session_id, quiz.id);

        let (question_id, selected) = match action {
            PlayAction::Retake => {
                let attempt = self.retake(user_id, &quiz, &pointer).await?;
                let view = self
                    .render(user_id, quiz, &questions, attempt, None, None)
                    .await?;
                return Ok(PlayOutcome::Render(view));
            }
            PlayAction::Answer {
                question_id,
                selected,
            } => (question_id, selected),
        };

        let attempt = self.start_or_resume_attempt(user_id, &quiz, &pointer).await?;

        let question = match question_id {
            Some(id) => questions
                .iter()
                .find(|q| q.id == id)
                .cloned()
                .ok_or_else(|| AppError::NotFound("Question not found in this quiz".to_string()))?,
            None => match self.resolve_current_question(&attempt, &questions, None).await? {
                Resolution::Question(q) => q,
                Resolution::Completed { .. } => {
                    self.finalize(&attempt).await?;
                    return Ok(PlayOutcome::RedirectToCompletion { quiz_id: quiz.id });
                }
            },
        };

        let Some(selected) = selected else {
            // No answer given: nothing is recorded and the attempt stays on this question.
            tracing::debug!(attempt_id = attempt.id, question_id = question.id, "empty submission ignored");
            let feedback = Feedback {
                question_id: question.id,
                is_correct: false,
                correct_answer: None,
                selected_answer: None,
                recorded: false,
                duplicate: false,
                accuracy: self.running_accuracy(attempt.id).await?,
                next_question_id: Some(question.id),
            };
            let view = self
                .render(user_id, quiz, &questions, attempt, Some(question.id), Some(feedback))
                .await?;
            return Ok(PlayOutcome::Render(view));
        };

        match self
            .submit_answer(&attempt, &questions, &question, &selected)
            .await?
        {
            SubmitOutcome::Completed => Ok(PlayOutcome::RedirectToCompletion { quiz_id: quiz.id }),
            SubmitOutcome::Next(feedback) => {
                // Re-read: the score may have changed.
                let attempt = self
                    .quizzes
                    .get_attempt(attempt.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;
                let view = self
                    .render(user_id, quiz, &questions, attempt, Some(question.id), Some(feedback))
                    .await?;
                Ok(PlayOutcome::Render(view))
            }
        }
    }

    async fn render(
        &self,
        user_id: i64,
        quiz: Quiz,
        questions: &[Question],
        attempt: QuizAttempt,
        requested_question_id: Option<i64>,
        feedback: Option<Feedback>,
    ) -> Result<PlayView, AppError> {
        let resolution = self
            .resolve_current_question(&attempt, questions, requested_question_id)
            .await?;

        let (attempt, question, current_accuracy) = match resolution {
            Resolution::Question(q) => {
                let current = match &feedback {
                    Some(f) => f.accuracy,
                    None => self.running_accuracy(attempt.id).await?,
                };
                (attempt, Some(q), current)
            }
            Resolution::Completed { accuracy } => {
                let attempt = self.finalize(&attempt).await?;
                (attempt, None, accuracy)
            }
        };

        let previous_attempts = self
            .quizzes
            .list_attempt_summaries(user_id, quiz.id)
            .await?
            .into_iter()
            .filter(|s| s.attempt.id != attempt.id)
            .map(|s| AttemptSummary {
                accuracy: accuracy(s.correct_count, s.total_answered),
                attempt: s.attempt,
                total_answered: s.total_answered,
                correct_count: s.correct_count,
            })
            .collect();

        Ok(PlayView {
            question_index: question.as_ref().and_then(|q| position_of(questions, q.id)),
            next_question_id: feedback.as_ref().and_then(|f| f.next_question_id),
            question: question.as_ref().map(PublicQuestion::from),
            quiz,
            attempt_id: attempt.id,
            completed: attempt.is_completed(),
            feedback,
            score: attempt.score,
            accuracy: current_accuracy,
            total_questions: questions.len(),
            time_taken_seconds: attempt.time_taken_seconds,
            previous_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::quiz::{CreateQuestionRequest, CreateQuizRequest, QuestionType},
        store::MemoryStore,
    };

    const USER: i64 = 7;

    async fn seed_quiz(store: &MemoryStore, answers: &[&str]) -> Quiz {
        let req = CreateQuizRequest {
            title: "Capitals".to_string(),
            is_public: true,
            is_timed: false,
            time_limit_seconds: None,
            questions: answers
                .iter()
                .enumerate()
                .map(|(i, answer)| CreateQuestionRequest {
                    text: format!("Question {}", i + 1),
                    question_type: QuestionType::MultipleChoice,
                    correct_answer: answer.to_string(),
                    options: vec![answer.to_string(), "Nowhere".to_string()],
                })
                .collect(),
        };
        store.create_quiz(1, &req).await.unwrap()
    }

    fn answer(question_id: Option<i64>, selected: &str) -> PlayAction {
        PlayAction::Answer {
            question_id,
            selected: Some(selected.to_string()),
        }
    }

    fn expect_view(outcome: PlayOutcome) -> PlayView {
        match outcome {
            PlayOutcome::Render(view) => view,
            other => panic!("expected a rendered view, got {:?}", other),
        }
    }

    #[test]
    fn accuracy_is_rounded_to_two_decimals() {
        assert_eq!(accuracy(2, 3), 66.67);
        assert_eq!(accuracy(1, 3), 33.33);
        assert_eq!(accuracy(3, 3), 100.0);
        assert_eq!(accuracy(0, 0), 0.0);
    }

    #[test]
    fn matching_ignores_case_and_surrounding_whitespace() {
        assert!(answers_match(" paris ", "Paris"));
        assert!(answers_match("TRUE", "true"));
        assert!(!answers_match("Pa ris", "Paris"));
    }

    #[test]
    fn attempt_pointer_key_is_per_quiz() {
        let sid = Uuid::new_v4();
        assert_eq!(AttemptPointer::for_quiz(sid, 12).key, "quiz_12_attempt_id");
    }

    #[tokio::test]
    async fn resolve_without_submitting_never_skips() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris", "Rome", "Madrid"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let attempt = store.create_attempt(USER, quiz.id).await.unwrap();

        for _ in 0..3 {
            match progression
                .resolve_current_question(&attempt, &questions, None)
                .await
                .unwrap()
            {
                Resolution::Question(q) => assert_eq!(q.id, questions[0].id),
                Resolution::Completed { .. } => panic!("nothing answered yet"),
            }
        }
    }

    #[tokio::test]
    async fn explicit_navigation_returns_requested_question() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris", "Rome"]).await;
        let other = seed_quiz(&store, &["Oslo"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let foreign = store.get_questions_ordered_by_id(other.id).await.unwrap();
        let attempt = store.create_attempt(USER, quiz.id).await.unwrap();

        let picked = progression
            .resolve_current_question(&attempt, &questions, Some(questions[1].id))
            .await
            .unwrap();
        assert!(matches!(picked, Resolution::Question(q) if q.id == questions[1].id));

        // A question from another quiz is ignored in favour of the next unanswered one.
        let fallback = progression
            .resolve_current_question(&attempt, &questions, Some(foreign[0].id))
            .await
            .unwrap();
        assert!(matches!(fallback, Resolution::Question(q) if q.id == questions[0].id));
    }

    #[tokio::test]
    async fn duplicate_submission_is_idempotent() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris", "Rome"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let attempt = store.create_attempt(USER, quiz.id).await.unwrap();

        let first = progression
            .submit_answer(&attempt, &questions, &questions[0], "Paris")
            .await
            .unwrap();
        let second = progression
            .submit_answer(&attempt, &questions, &questions[0], "wrong on purpose")
            .await
            .unwrap();

        let (SubmitOutcome::Next(a), SubmitOutcome::Next(b)) = (first, second) else {
            panic!("quiz has a second question");
        };
        assert!(a.is_correct && !a.duplicate);
        assert!(b.is_correct && b.duplicate);
        assert_eq!(b.next_question_id, Some(questions[1].id));
        assert_eq!(store.count_answers(attempt.id).await.unwrap(), 1);
        assert_eq!(store.get_attempt(attempt.id).await.unwrap().unwrap().score, 1);
    }

    #[tokio::test]
    async fn score_never_decreases() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["A", "B", "C", "D"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let attempt = store.create_attempt(USER, quiz.id).await.unwrap();

        let mut last = 0;
        for (question, given) in questions.iter().zip(["A", "x", "C", "x"]) {
            progression
                .submit_answer(&attempt, &questions, question, given)
                .await
                .unwrap();
            let score = store.get_attempt(attempt.id).await.unwrap().unwrap().score;
            assert!(score >= last);
            last = score;
        }
        assert_eq!(last, 2);
    }

    #[tokio::test]
    async fn running_accuracy_after_three_answers() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["A", "B", "C", "D"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let attempt = store.create_attempt(USER, quiz.id).await.unwrap();

        let mut feedback = None;
        for (question, given) in questions.iter().take(3).zip(["A", "B", "nope"]) {
            if let SubmitOutcome::Next(f) = progression
                .submit_answer(&attempt, &questions, question, given)
                .await
                .unwrap()
            {
                feedback = Some(f);
            }
        }
        let feedback = feedback.unwrap();
        assert_eq!(feedback.accuracy, 66.67);
        assert_eq!(feedback.correct_answer.as_deref(), Some("C"));
        assert_eq!(feedback.next_question_id, Some(questions[3].id));
    }

    #[tokio::test]
    async fn two_correct_answers_complete_the_attempt() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris", "Rome"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let sid = Uuid::new_v4();

        let first = progression
            .handle_post(USER, quiz.id, sid, answer(None, "paris"))
            .await
            .unwrap();
        let view = expect_view(first);
        assert!(!view.completed);
        assert_eq!(view.question_index, Some(1));
        assert_eq!(view.total_questions, 2);

        let second = progression
            .handle_post(USER, quiz.id, sid, answer(None, " ROME "))
            .await
            .unwrap();
        assert!(matches!(second, PlayOutcome::RedirectToCompletion { quiz_id } if quiz_id == quiz.id));

        let done = progression.show(USER, quiz.id, sid, None).await.unwrap();
        assert!(done.completed);
        assert!(done.question.is_none());
        assert_eq!(done.score, 2);
        assert_eq!(done.accuracy, 100.0);
        assert!(done.time_taken_seconds.unwrap() >= 0);

        let board = store.leaderboard(quiz.id, 50).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].score, 2);
    }

    #[tokio::test]
    async fn repeated_completion_requests_insert_one_entry() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let sid = Uuid::new_v4();

        for _ in 0..3 {
            let outcome = progression
                .handle_post(USER, quiz.id, sid, answer(Some(questions[0].id), "Paris"))
                .await
                .unwrap();
            assert!(matches!(outcome, PlayOutcome::RedirectToCompletion { .. }));
            progression.show(USER, quiz.id, sid, None).await.unwrap();
        }
        let outcome = progression
            .handle_post(USER, quiz.id, sid, answer(None, "Paris"))
            .await
            .unwrap();
        assert!(matches!(outcome, PlayOutcome::RedirectToCompletion { .. }));

        assert_eq!(store.leaderboard(quiz.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn interleaved_final_submissions_complete_once() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let questions = store.get_questions_ordered_by_id(quiz.id).await.unwrap();
        let sid = Uuid::new_v4();
        let opened = progression.show(USER, quiz.id, sid, None).await.unwrap();

        let (a, b) = tokio::join!(
            progression.handle_post(USER, quiz.id, sid, answer(Some(questions[0].id), "Paris")),
            progression.handle_post(USER, quiz.id, sid, answer(Some(questions[0].id), "Paris")),
        );
        assert!(matches!(a.unwrap(), PlayOutcome::RedirectToCompletion { .. }));
        assert!(matches!(b.unwrap(), PlayOutcome::RedirectToCompletion { .. }));

        let attempt = store.get_attempt(opened.attempt_id).await.unwrap().unwrap();
        assert!(attempt.is_completed());
        assert_eq!(attempt.score, 1);
        assert_eq!(store.count_answers(attempt.id).await.unwrap(), 1);
        assert_eq!(store.leaderboard(quiz.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retake_starts_a_new_attempt_and_keeps_history() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let sid = Uuid::new_v4();

        progression
            .handle_post(USER, quiz.id, sid, answer(None, "Paris"))
            .await
            .unwrap();
        let finished = progression.show(USER, quiz.id, sid, None).await.unwrap();
        assert!(finished.completed);

        let retaken = expect_view(
            progression
                .handle_post(USER, quiz.id, sid, PlayAction::Retake)
                .await
                .unwrap(),
        );
        assert_ne!(retaken.attempt_id, finished.attempt_id);
        assert!(!retaken.completed);
        assert_eq!(retaken.score, 0);
        assert_eq!(retaken.previous_attempts.len(), 1);
        assert_eq!(retaken.previous_attempts[0].attempt.id, finished.attempt_id);
        assert_eq!(retaken.previous_attempts[0].accuracy, 100.0);

        // The session now points at the new attempt.
        let resumed = progression.show(USER, quiz.id, sid, None).await.unwrap();
        assert_eq!(resumed.attempt_id, retaken.attempt_id);

        let old = store.get_attempt(finished.attempt_id).await.unwrap().unwrap();
        assert_eq!(old.score, 1);
        assert_eq!(store.count_answers(old.id).await.unwrap(), 1);
        assert_eq!(store.leaderboard(quiz.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_quiz_is_completed_immediately() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &[]).await;
        let progression = QuizAttemptProgression::new(&store, &store);

        let view = progression
            .show(USER, quiz.id, Uuid::new_v4(), None)
            .await
            .unwrap();
        assert!(view.completed);
        assert_eq!(view.accuracy, 0.0);
        assert_eq!(view.total_questions, 0);
        assert!(view.question.is_none());
    }

    #[tokio::test]
    async fn stale_pointer_starts_a_new_attempt() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let pointer = AttemptPointer::for_quiz(Uuid::new_v4(), quiz.id);
        store.set(pointer.session_id, &pointer.key, 9_999).await.unwrap();

        let attempt = progression
            .start_or_resume_attempt(USER, &quiz, &pointer)
            .await
            .unwrap();
        assert_ne!(attempt.id, 9_999);
        assert_eq!(
            store.get(pointer.session_id, &pointer.key).await.unwrap(),
            Some(attempt.id)
        );

        let again = progression
            .start_or_resume_attempt(USER, &quiz, &pointer)
            .await
            .unwrap();
        assert_eq!(again.id, attempt.id);
    }

    #[tokio::test]
    async fn missing_answer_records_nothing_and_stays_put() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris", "Rome"]).await;
        let progression = QuizAttemptProgression::new(&store, &store);
        let sid = Uuid::new_v4();

        let view = expect_view(
            progression
                .handle_post(
                    USER,
                    quiz.id,
                    sid,
                    PlayAction::Answer {
                        question_id: None,
                        selected: None,
                    },
                )
                .await
                .unwrap(),
        );
        let feedback = view.feedback.unwrap();
        assert!(!feedback.is_correct);
        assert!(!feedback.recorded);
        assert!(feedback.correct_answer.is_none());
        assert_eq!(store.count_answers(view.attempt_id).await.unwrap(), 0);

        let next = progression.show(USER, quiz.id, sid, None).await.unwrap();
        assert_eq!(next.question.unwrap().id, feedback.question_id);
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let store = MemoryStore::new();
        let progression = QuizAttemptProgression::new(&store, &store);
        let err = progression
            .show(USER, 404, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn answering_a_foreign_question_is_not_found() {
        let store = MemoryStore::new();
        let quiz = seed_quiz(&store, &["Paris"]).await;
        let other = seed_quiz(&store, &["Oslo"]).await;
        let foreign = store.get_questions_ordered_by_id(other.id).await.unwrap();
        let progression = QuizAttemptProgression::new(&store, &store);

        let err = progression
            .handle_post(USER, quiz.id, Uuid::new_v4(), answer(Some(foreign[0].id), "Oslo"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
