//! Error types for photonest-core

use thiserror::Error;

/// Result type alias using photonest-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in photonest-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The remote backend could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The remote backend answered with an error
    #[error("Remote error: {0}")]
    Remote(String),

    /// Local cache error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No signed-in user, or the session expired
    #[error("Not signed in")]
    Unauthenticated,

    /// The signed-in user may not perform this action
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Authentication service error
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// One-time-password service error
    #[error(transparent)]
    Otp(#[from] crate::otp::OtpError),
}

impl Error {
    /// Whether this error means the backend was unreachable.
    ///
    /// Reads fall back to the local cache on any remote failure, but screens
    /// use this to tell "you're offline" apart from everything else.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Auth(error) => error.is_network(),
            Self::Otp(error) => error.is_network(),
            _ => false,
        }
    }

    /// Message suitable for a dismissible alert.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "No internet connection. Please try again.".to_string(),
            Self::Unauthenticated => "Please sign in to continue.".to_string(),
            Self::InvalidInput(message)
            | Self::PermissionDenied(message)
            | Self::NotFound(message) => message.clone(),
            Self::Auth(error) => error.to_string(),
            Self::Otp(error) => error.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            Self::Network(error.to_string())
        } else {
            Self::Remote(error.to_string())
        }
    }
}
