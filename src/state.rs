use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    progression::QuizAttemptProgression,
    store::{MemoryStore, PgStore, QuizRepository, SessionStore, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Config,
}

impl AppState {
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            quizzes: store.clone(),
            sessions: store,
            config,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            quizzes: store.clone(),
            sessions: store,
            config,
        }
    }

    pub fn progression(&self) -> QuizAttemptProgression<'_> {
        QuizAttemptProgression::new(self.quizzes.as_ref(), self.sessions.as_ref())
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
