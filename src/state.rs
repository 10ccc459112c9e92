//! Application state: config, the Anthropic client, and in-memory sessions.
//!
//! A session is what one browser tab works with: the deck, the current
//! upload, the generating flag and the last error message. Nothing is
//! persisted. Idle sessions are swept whenever a new one is created: past
//! `session_ttl_secs` they are dropped, and beyond `max_sessions` the least
//! recently used go first. A session with a generation in flight is never
//! swept.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::anthropic::Anthropic;
use crate::config::AppConfig;
use crate::deck::Deck;
use crate::domain::Upload;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub deck: Deck,
    pub upload: Option<Upload>,
    pub generating: bool,
    pub error: String,
    /// Last time `with_session` ran against this session.
    pub touched: Instant,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            deck: Deck::default(),
            upload: None,
            generating: false,
            error: String::new(),
            touched: Instant::now(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    pub anthropic: Anthropic,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build state from env: load config and init the Anthropic client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, AppError> {
        Self::with_config(AppConfig::from_env())
    }

    pub fn with_config(config: AppConfig) -> Result<Self, AppError> {
        let anthropic = Anthropic::new(&config.llm).map_err(|e| AppError::Config(e.to_string()))?;
        if anthropic.api_key.is_some() {
            info!(target: "flashcards_backend", base_url = %anthropic.base_url, model = %anthropic.model, "Anthropic client ready.");
        } else {
            info!(target: "flashcards_backend", base_url = %anthropic.base_url, model = %anthropic.model, "ANTHROPIC_API_KEY not set; requests are sent without a key.");
        }
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            anthropic,
            config: Arc::new(config),
        })
    }

    /// Sweep idle sessions, then create and register an empty one.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write().await;
        let evicted = evict_idle(
            &mut sessions,
            Duration::from_secs(self.config.session_ttl_secs),
            self.config.max_sessions,
        );
        sessions.insert(session.id.clone(), session.clone());
        info!(target: "flashcards", session = %session.id, evicted, live = sessions.len(), "Session created");
        session
    }

    /// Run `f` against the session under the write lock. Keep `f` short and
    /// never await inside it.
    pub async fn with_session<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        session.touched = Instant::now();
        Ok(f(session))
    }

    /// Read-only access to a session by id. Does not count as use.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: &str) -> Result<Session, AppError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }
}

/// Drop expired sessions, then the least recently used until there is room
/// for one more under `max`. Returns how many were removed.
fn evict_idle(sessions: &mut HashMap<String, Session>, ttl: Duration, max: usize) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| s.generating || s.touched.elapsed() < ttl);
    while sessions.len() >= max.max(1) {
        let oldest = sessions
            .values()
            .filter(|s| !s.generating)
            .min_by_key(|s| s.touched)
            .map(|s| s.id.clone());
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backdate(state: &AppState, id: &str, secs: u64) {
        let mut sessions = state.sessions.write().await;
        let s = sessions.get_mut(id).expect("session");
        s.touched = Instant::now().checked_sub(Duration::from_secs(secs)).expect("instant");
    }

    fn capped(ttl: u64, max: usize) -> AppState {
        let mut cfg = AppConfig::default();
        cfg.session_ttl_secs = ttl;
        cfg.max_sessions = max;
        AppState::with_config(cfg).expect("state")
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let state = AppState::with_config(AppConfig::default()).expect("state");
        let a = state.create_session().await;
        let b = state.create_session().await;
        assert_ne!(a.id, b.id);

        state
            .with_session(&a.id, |s| s.error = "boom".into())
            .await
            .expect("session a");
        assert_eq!(state.get_session(&a.id).await.expect("a").error, "boom");
        assert!(state.get_session(&b.id).await.expect("b").error.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = AppState::with_config(AppConfig::default()).expect("state");
        assert!(matches!(
            state.get_session("missing").await,
            Err(AppError::SessionNotFound(_))
        ));
        assert!(matches!(
            state.with_session("missing", |_| ()).await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_sessions_are_swept_unless_generating() {
        let state = capped(60, 100);
        let idle = state.create_session().await;
        let busy = state.create_session().await;
        let fresh = state.create_session().await;
        state.with_session(&busy.id, |s| s.generating = true).await.expect("busy");
        backdate(&state, &idle.id, 120).await;
        backdate(&state, &busy.id, 120).await;

        let newest = state.create_session().await;
        assert!(matches!(state.get_session(&idle.id).await, Err(AppError::SessionNotFound(_))));
        assert!(state.get_session(&busy.id).await.is_ok());
        assert!(state.get_session(&fresh.id).await.is_ok());
        assert!(state.get_session(&newest.id).await.is_ok());
    }

    #[tokio::test]
    async fn session_cap_evicts_least_recently_used() {
        let state = capped(3600, 2);
        let a = state.create_session().await;
        let b = state.create_session().await;
        backdate(&state, &a.id, 20).await;
        backdate(&state, &b.id, 10).await;
        // Using `a` makes `b` the oldest.
        state.with_session(&a.id, |s| s.error.clear()).await.expect("a");

        let c = state.create_session().await;
        assert_eq!(state.sessions.read().await.len(), 2);
        assert!(state.get_session(&a.id).await.is_ok());
        assert!(matches!(state.get_session(&b.id).await, Err(AppError::SessionNotFound(_))));
        assert!(state.get_session(&c.id).await.is_ok());
    }
}
