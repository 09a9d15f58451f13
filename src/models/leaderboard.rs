// src/models/leaderboard.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::quiz::Quiz;

/// Represents the 'leaderboard_entries' table.
/// Append-only: one row per completed attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub attempt_id: i64,
    pub score: i32,
    pub time_taken_seconds: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Ranking row for display, joined with `users`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardRow {
    pub username: String,
    pub score: i32,
    pub time_taken_seconds: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'daily_challenges' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DailyChallenge {
    pub id: i64,
    pub quiz_id: i64,
    pub date: chrono::NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DailyChallengeResponse {
    pub date: chrono::NaiveDate,
    pub quiz: Quiz,
}
