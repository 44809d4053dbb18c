//! Authentication module for InvestHub

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{bearer_token, optional_auth, Viewer};
