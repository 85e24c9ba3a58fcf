use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}", .0.user_message())]
    Core(#[from] photonest_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// Failure reported by a screen as its error message
    #[error("{0}")]
    Screen(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `photonest auth login` first.")]
    NotSignedIn,
    #[error("Invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },
    #[error("No user named @{0}")]
    UnknownUser(String),
    #[error("Comment text cannot be empty")]
    EmptyComment,
    #[error("Unsupported image type for {0} (use jpg, png, gif, webp or heic)")]
    UnsupportedImage(String),
}
