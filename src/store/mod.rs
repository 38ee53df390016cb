//! The application state container.
//!
//! `AppState` holds a session slice and a finance slice. It is changed only by dispatching an
//! `Action` through a `Store`, which runs the slice's reducer while holding the state lock, so
//! there is exactly one writer at a time. A `Store` is a cheap handle; clones share the same
//! state.
//!
//! When a `Store` is backed by a session file, every change to the session credentials is
//! written to disk, and an empty session removes the file.

mod finance;
mod session;

pub use finance::{FinanceAction, FinanceState, RecordLists};
pub use session::{AuthAction, AuthPhase, PersistedSession, SessionState, Token};

use crate::error::Res;
use crate::utils;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AppState {
    session: SessionState,
    finance: FinanceState,
}

impl AppState {
    pub fn new(session: SessionState, finance: FinanceState) -> Self {
        Self { session, finance }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn finance(&self) -> &FinanceState {
        &self.finance
    }

    /// Runs the reducer of the slice that `action` belongs to.
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::Auth(a) => self.session.reduce(a),
            Action::Finance(a) => self.finance.reduce(a),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Auth(AuthAction),
    Finance(FinanceAction),
}

impl From<AuthAction> for Action {
    fn from(value: AuthAction) -> Self {
        Action::Auth(value)
    }
}

impl From<FinanceAction> for Action {
    fn from(value: FinanceAction) -> Self {
        Action::Finance(value)
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<Mutex<AppState>>,
    session_file: Option<SessionFile>,
}

impl Store {
    /// A store that keeps everything in memory.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            session_file: None,
        }
    }

    /// A store whose session is restored from, and saved to, the file at `path`. A missing file
    /// means there is no session.
    pub async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let session_file = SessionFile::new(path);
        let persisted = session_file.load().await?;
        let state = AppState::new(SessionState::restored(persisted), FinanceState::default());
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            session_file: Some(session_file),
        })
    }

    pub async fn dispatch(&self, action: impl Into<Action>) -> Res<()> {
        let action = action.into();
        trace!("dispatch {action:?}");
        let mut state = self.state.lock().await;
        let before = state.session.persisted();
        state.reduce(action);
        let after = state.session.persisted();
        if before != after {
            if let Some(file) = &self.session_file {
                // The lock is still held so that saves land in dispatch order.
                file.save(&after).await?;
            }
        }
        Ok(())
    }

    /// A snapshot of the whole state.
    pub async fn state(&self) -> AppState {
        self.state.lock().await.clone()
    }

    /// Reads part of the state without cloning all of it.
    pub async fn select<T>(&self, f: impl FnOnce(&AppState) -> T) -> T {
        let state = self.state.lock().await;
        f(&state)
    }

    pub async fn access_token(&self) -> Option<Token> {
        self.select(|s| s.session.access().cloned()).await
    }

    pub async fn refresh_token(&self) -> Option<Token> {
        self.select(|s| s.session.refresh().cloned()).await
    }

    pub fn session_path(&self) -> Option<&Path> {
        self.session_file.as_ref().map(|f| f.path.as_path())
    }
}

/// The JSON file that holds the persisted session.
#[derive(Debug, Clone)]
struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Res<PersistedSession> {
        if !self.path.is_file() {
            debug!("No session file at {}", self.path.display());
            return Ok(PersistedSession::default());
        }
        utils::deserialize(&self.path)
            .await
            .context("Unable to read the saved session, try logging in again")
    }

    async fn save(&self, session: &PersistedSession) -> Res<()> {
        if session.is_empty() {
            debug!("Removing session file {}", self.path.display());
            return utils::remove(&self.path).await;
        }
        let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        utils::write_secret(&self.path, json).await?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn login(access: &str) -> AuthAction {
        AuthAction::LoggedIn {
            access: Token::new(access),
            refresh: Some(Token::new("r")),
        }
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = Store::load(&path).await.unwrap();
        assert!(!store.state().await.session().is_authenticated());
        store.dispatch(login("a1")).await.unwrap();
        assert!(path.is_file());

        let restarted = Store::load(&path).await.unwrap();
        assert!(restarted.state().await.session().is_authenticated());
        assert_eq!(restarted.access_token().await.unwrap().as_str(), "a1");
        assert_eq!(restarted.refresh_token().await.unwrap().as_str(), "r");
    }

    #[tokio::test]
    async fn test_refreshed_token_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = Store::load(&path).await.unwrap();
        store.dispatch(login("a1")).await.unwrap();
        store
            .dispatch(AuthAction::TokenReceived(Token::new("a2")))
            .await
            .unwrap();
        let restarted = Store::load(&path).await.unwrap();
        assert_eq!(restarted.access_token().await.unwrap().as_str(), "a2");
    }

    #[tokio::test]
    async fn test_logout_removes_session_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = Store::load(&path).await.unwrap();
        store.dispatch(login("a1")).await.unwrap();
        store.dispatch(AuthAction::LoggedOut).await.unwrap();
        assert!(!path.exists());
        let restarted = Store::load(&path).await.unwrap();
        assert!(restarted.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = Store::new(AppState::default());
        let other = store.clone();
        other
            .dispatch(FinanceAction::DateSelected(
                chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            ))
            .await
            .unwrap();
        assert!(store.state().await.finance().selected_date().is_some());
        assert!(store.session_path().is_none());
    }
}
