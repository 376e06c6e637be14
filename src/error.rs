//! Error types for the playback mirror

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, ApiError>;

/// Failures surfaced by the client, the token manager and the handshake peer
#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable access credential after exhausting refresh attempts
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access denied")]
    Permission,

    #[error("Not found")]
    NotFound,

    #[error("Internal server error")]
    Server,

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// The local handshake peer reported an error during the code exchange
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The request never produced a response (connection refused, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// Whether the stored refresh credential should be considered unusable
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Transport(error.to_string())
    }
}
