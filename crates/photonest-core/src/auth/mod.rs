//! Account authentication: sessions, persistence and auth providers.

mod firebase;
mod memory;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use firebase::{FirebaseAuthClient, FirebaseAuthEndpoints};
pub use memory::{InMemoryAuthProvider, MemorySessionStore};

const EXPIRY_SKEW_SECONDS: i64 = 60;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= chrono::Utc::now().timestamp() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Incorrect email or password.")]
    InvalidCredentials,
    #[error("That email address is already in use.")]
    EmailAlreadyInUse,
    #[error("Password is too weak: {0}")]
    WeakPassword(String),
    #[error("No account exists for that email address.")]
    UserNotFound,
    #[error("Too many attempts. Please try again later.")]
    TooManyRequests,
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,
    #[error("Not signed in.")]
    NotSignedIn,
    #[error("Auth service unreachable: {0}")]
    Unreachable(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

impl AuthError {
    /// Whether the auth service could not be reached at all
    pub fn is_network(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Http(error) => error.is_connect() || error.is_timeout() || error.is_request(),
            _ => false,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Email/password account backend
///
/// Implementations persist the session they hand out and forget it again on
/// [`AuthProvider::sign_out`].
pub trait AuthProvider: Clone + Send + Sync + 'static {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<AuthSession>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<AuthSession>> + Send;

    /// Exchange the refresh token for a fresh id token
    fn refresh(&self, session: &AuthSession)
        -> impl Future<Output = AuthResult<AuthSession>> + Send;

    fn send_password_reset(&self, email: &str) -> impl Future<Output = AuthResult<()>> + Send;

    fn delete_account(&self, session: &AuthSession)
        -> impl Future<Output = AuthResult<()>> + Send;

    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;

    /// Load the persisted session, refreshing it when expired
    fn restore_session(&self) -> impl Future<Output = AuthResult<Option<AuthSession>>> + Send;
}

/// Shared cell holding the signed-in session
///
/// The auth repository writes it; the document store reads the id token
/// from it for every request.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.current())
            .finish()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.inner.read().ok().and_then(|session| session.clone())
    }

    pub fn set(&self, session: Option<AuthSession>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = session;
        }
    }

    pub fn id_token(&self) -> Option<String> {
        self.current().map(|session| session.id_token)
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|session| session.user.id)
    }
}

pub(crate) fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    validate_email(email)?;
    if password.trim().is_empty() {
        return Err(AuthError::InvalidInput("Password is required".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_new_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "use at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> AuthResult<String> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email is required".to_string()));
    }
    crate::util::normalize_email(email)
        .ok_or_else(|| AuthError::InvalidInput("Enter a valid email address".to_string()))
}
