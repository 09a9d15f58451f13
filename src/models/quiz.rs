// src/models/quiz.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

/// Maximum number of answer options a question may carry.
pub const MAX_OPTIONS: usize = 4;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub creator_id: i64,
    pub is_public: bool,
    pub is_timed: bool,
    pub time_limit_seconds: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Question kind. Stored as the two-letter code in the `question_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    TrueFalse,
    MultipleChoice,
}

impl QuestionType {
    pub fn as_code(self) -> &'static str {
        match self {
            QuestionType::TrueFalse => "TF",
            QuestionType::MultipleChoice => "MC",
        }
    }
}

#[derive(Debug)]
pub struct UnknownQuestionType(pub String);

impl fmt::Display for UnknownQuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown question type code '{}'", self.0)
    }
}

impl std::error::Error for UnknownQuestionType {}

impl TryFrom<String> for QuestionType {
    type Error = UnknownQuestionType;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        match code.as_str() {
            "TF" => Ok(QuestionType::TrueFalse),
            "MC" => Ok(QuestionType::MultipleChoice),
            _ => Err(UnknownQuestionType(code)),
        }
    }
}

/// Represents the 'questions' table in the database.
///
/// Questions of a quiz are presented in ascending `id` order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,

    #[sqlx(try_from = "String")]
    pub question_type: QuestionType,

    /// Canonical answer. Compared case-insensitively after trimming.
    pub correct_answer: String,

    /// Up to four option strings, stored as a JSON array.
    pub options: Json<Vec<String>>,
}

/// DTO for sending a question to the client (excludes the answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            question_type: q.question_type,
            options: q.options.0.clone(),
        }
    }
}

/// Quiz detail returned by `GET /api/quizzes/{id}`.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Entry in the public quiz list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: i64,
}

/// DTO for creating a quiz together with its questions.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_time_limit))]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub is_timed: bool,
    #[validate(range(min = 1))]
    pub time_limit_seconds: Option<i32>,
    #[validate(length(max = 100), nested)]
    #[serde(default)]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_answer_key))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 200))]
    pub correct_answer: String,
    #[validate(custom(function = validate_options))]
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn validate_time_limit(req: &CreateQuizRequest) -> Result<(), ValidationError> {
    if req.is_timed && req.time_limit_seconds.is_none() {
        return Err(ValidationError::new("timed_quiz_requires_time_limit"));
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() > MAX_OPTIONS {
        return Err(ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 200 {
            return Err(ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_answer_key(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let answer = req.correct_answer.trim().to_lowercase();
    match req.question_type {
        QuestionType::TrueFalse => {
            if answer != "true" && answer != "false" {
                return Err(ValidationError::new("true_false_answer_must_be_true_or_false"));
            }
        }
        QuestionType::MultipleChoice => {
            if req.options.len() < 2 {
                return Err(ValidationError::new("multiple_choice_needs_two_options"));
            }
            if !req.options.iter().any(|o| o.trim().to_lowercase() == answer) {
                return Err(ValidationError::new("correct_answer_not_in_options"));
            }
        }
    }
    Ok(())
}
