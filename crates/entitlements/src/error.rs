//! Entitlement error types

use thiserror::Error;

/// Errors raised while fetching subscription, plan, or identity data
///
/// The resolver never surfaces these to its callers; they exist so data
/// sources can report what went wrong and the resolver can log it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Fetch timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<sqlx::Error> for FetchError {
    fn from(err: sqlx::Error) -> Self {
        FetchError::Database(err.to_string())
    }
}

/// Entitlement-specific errors
#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EntitlementResult<T> = Result<T, EntitlementError>;
