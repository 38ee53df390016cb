//! The session slice: who is signed in and with which credential.

use crate::model::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Formatter};

/// An opaque bearer credential. `Debug` does not print the secret.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token(***)")
    }
}

/// Where the session is in its lifecycle.
///
/// ```text
/// Anonymous --login--> Authenticated --401--> ExpiredPendingRefresh --ok--> Authenticated
///     ^                                               |
///     +-------------------refresh failed--------------+
/// ```
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticated,
    ExpiredPendingRefresh,
}

serde_plain::derive_display_from_serialize!(AuthPhase);

/// The credentials that survive between runs.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<Token>,
}

impl PersistedSession {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Actions that change the session slice.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    /// A request was started.
    Pending,
    /// Credentials were exchanged for a token pair.
    LoggedIn {
        access: Token,
        refresh: Option<Token>,
    },
    /// A new account was created.
    Registered(User),
    /// A password reset email was requested.
    PasswordResetRequested,
    /// The current user's profile was fetched.
    ProfileLoaded(User),
    /// A request failed; holds the server's error payload.
    Rejected(Value),
    /// A request was refused for lack of a valid credential and a refresh is underway.
    RefreshStarted,
    /// A new access credential was issued by a refresh.
    TokenReceived(Token),
    /// The refresh could not produce a new credential.
    RefreshFailed,
    LoggedOut,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SessionState {
    #[serde(skip)]
    access: Option<Token>,
    #[serde(skip)]
    refresh: Option<Token>,
    is_authenticated: bool,
    phase: AuthPhase,
    user: Option<User>,
    loading: bool,
    error: Option<Value>,
}

impl SessionState {
    /// Rebuilds the session from persisted credentials. Having an access credential is taken to
    /// mean being authenticated until the server says otherwise.
    pub fn restored(persisted: PersistedSession) -> Self {
        let is_authenticated = persisted.access.is_some();
        Self {
            access: persisted.access,
            refresh: persisted.refresh,
            is_authenticated,
            phase: if is_authenticated {
                AuthPhase::Authenticated
            } else {
                AuthPhase::Anonymous
            },
            ..Self::default()
        }
    }

    pub fn access(&self) -> Option<&Token> {
        self.access.as_ref()
    }

    pub fn refresh(&self) -> Option<&Token> {
        self.refresh.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    /// The part of the session that is written to disk.
    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }

    pub fn reduce(&mut self, action: AuthAction) {
        match action {
            AuthAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            AuthAction::LoggedIn { access, refresh } => {
                self.loading = false;
                self.access = Some(access);
                if refresh.is_some() {
                    self.refresh = refresh;
                }
                self.is_authenticated = true;
                self.phase = AuthPhase::Authenticated;
            }
            AuthAction::Registered(user) => {
                self.loading = false;
                self.user = Some(user);
            }
            AuthAction::PasswordResetRequested => {
                self.loading = false;
            }
            AuthAction::ProfileLoaded(user) => {
                self.loading = false;
                self.user = Some(user);
            }
            AuthAction::Rejected(payload) => {
                self.loading = false;
                self.error = Some(payload);
            }
            AuthAction::RefreshStarted => {
                self.phase = AuthPhase::ExpiredPendingRefresh;
            }
            AuthAction::TokenReceived(access) => {
                self.access = Some(access);
                self.is_authenticated = true;
                self.phase = AuthPhase::Authenticated;
            }
            AuthAction::RefreshFailed => {
                self.access = None;
                self.refresh = None;
                self.is_authenticated = false;
                self.phase = AuthPhase::Anonymous;
            }
            AuthAction::LoggedOut => {
                *self = SessionState::default();
            }
        }
    }
}
