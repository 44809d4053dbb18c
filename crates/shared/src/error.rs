//! Error types for InvestHub

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvestHubError {
    #[error("Invalid plan tier: {0}")]
    InvalidTier(String),
}
