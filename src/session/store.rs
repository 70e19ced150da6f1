//! Session Store
//!
//! Holds the current user's identity, token and permissions and drives
//! the login/register/logout/recover flows.
//!
//! ```text
//! anonymous --login/register/recover--> authenticating
//! authenticating --ok--> authenticated
//! authenticating --rejected--> error (login/register) | anonymous (recover)
//! authenticated --logout--> anonymous
//! ```

use super::storage::{PersistedSession, SessionStorage, StorageError};
use crate::api::{ApiError, AuthApi, Credentials, LoginResponse, TokenHandle};
use crate::permission;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Current session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub email: String,
    pub token: String,
    pub permissions: Vec<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    /// User-visible message of the last failed login or register
    pub error: Option<String>,
}

/// Phase of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Error,
}

impl Session {
    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Authenticating
        } else if self.is_authenticated {
            SessionPhase::Authenticated
        } else if self.error.is_some() {
            SessionPhase::Error
        } else {
            SessionPhase::Anonymous
        }
    }

    pub fn has_permission(&self, domain: &str, action: &str, target: &str) -> bool {
        permission::has_permission(&self.permissions, domain, action, target)
    }

    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            email: self.email.clone(),
            token: self.token.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// Errors from session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(e) => e.user_message(),
            SessionError::Storage(e) => e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AuthFlow {
    Login,
    Register,
}

/// Owner of the session state
pub struct SessionStore {
    state: RwLock<Session>,
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    token: TokenHandle,
}

impl SessionStore {
    /// Create an empty (anonymous) store
    pub fn new(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
        token: TokenHandle,
    ) -> Self {
        Self {
            state: RwLock::new(Session::default()),
            api,
            storage,
            token,
        }
    }

    /// Copy of the current session
    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    pub async fn has_permission(&self, domain: &str, action: &str, target: &str) -> bool {
        self.state
            .read()
            .await
            .has_permission(domain, action, target)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        self.authenticate(AuthFlow::Login, email, password).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        self.authenticate(AuthFlow::Register, email, password).await
    }

    async fn authenticate(
        &self,
        flow: AuthFlow,
        email: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        self.begin().await;

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let result = match flow {
            AuthFlow::Login => self.api.login(&credentials).await,
            AuthFlow::Register => self.api.register(&credentials).await,
        };

        match result {
            Ok(response) => {
                tracing::info!(email = %response.user.email, ?flow, "Authenticated");
                Ok(self.establish(response).await)
            }
            Err(e) => {
                tracing::warn!(email, ?flow, error = %e, "Authentication failed");
                // A previous session's grants must not outlive a failed sign-in
                self.token.clear().await;
                if let Err(err) = self.storage.clear() {
                    tracing::warn!(error = %err, "Failed to clear persisted session");
                }
                *self.state.write().await = Session {
                    error: Some(e.user_message()),
                    ..Session::default()
                };
                Err(e.into())
            }
        }
    }

    /// Ask the server to restore the session from its cookie.
    ///
    /// Returns `Ok(false)` when there is no session to recover; that is not
    /// an error and leaves the store anonymous.
    pub async fn recover_session(&self) -> Result<bool, SessionError> {
        self.begin().await;

        match self.api.recover().await {
            Ok(response) => {
                tracing::info!(email = %response.user.email, "Session recovered");
                self.establish(response).await;
                Ok(true)
            }
            Err(e) => {
                tracing::debug!(error = %e, "No session to recover");
                if e.is_unauthorized() {
                    if let Err(err) = self.storage.clear() {
                        tracing::warn!(error = %err, "Failed to clear persisted session");
                    }
                }
                self.reset().await;
                Ok(false)
            }
        }
    }

    /// Restore the session persisted by a previous run, without a network
    /// call. Returns whether a session was found.
    pub async fn load_state(&self) -> Result<bool, SessionError> {
        let Some(persisted) = self.storage.load()? else {
            return Ok(false);
        };

        if persisted.token.is_empty() {
            return Ok(false);
        }

        self.token.set(persisted.token.clone()).await;
        let mut state = self.state.write().await;
        *state = Session {
            email: persisted.email,
            token: persisted.token,
            permissions: persisted.permissions,
            is_authenticated: true,
            is_loading: false,
            error: None,
        };

        tracing::debug!(email = %state.email, "Loaded persisted session");
        Ok(true)
    }

    /// End the session. The server call is best effort; local state and
    /// the persisted copy are cleared regardless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        if let Err(e) = self.api.logout().await {
            tracing::warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.reset().await;
        self.storage.clear()?;

        tracing::info!("Logged out");
        Ok(())
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
    }

    async fn establish(&self, response: LoginResponse) -> Session {
        self.token.set(response.token.clone()).await;

        let session = Session {
            email: response.user.email,
            token: response.token,
            permissions: response.user.permissions,
            is_authenticated: true,
            is_loading: false,
            error: None,
        };

        if let Err(e) = self.storage.save(&session.persisted()) {
            tracing::warn!(error = %e, "Failed to persist session");
        }

        *self.state.write().await = session.clone();
        session
    }

    async fn reset(&self) {
        self.token.clear().await;
        *self.state.write().await = Session::default();
    }
}
