//! InvestHub API Library
//!
//! HTTP surface for entitlement resolution and feature access checks.

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod routes;
pub mod sessions;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use sessions::SessionRegistry;
pub use state::AppState;
