//! Data source contracts consumed by the resolver
//!
//! Implementations only fetch; they never decide access. Cancellation is
//! expressed by the caller dropping the returned future, so implementations
//! must not leave shared state half-written across an `.await`.

use async_trait::async_trait;
use investhub_shared::types::{Subscription, SubscriptionPlan, User, UserId};

use crate::error::FetchError;

/// Lookup of a user's subscription records
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Active subscriptions for `user_id`, most recently created first.
    /// An empty list means "no active subscription", which is not an error.
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>, FetchError>;
}

/// Lookup of the full plan catalog
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn plan_catalog(&self) -> Result<Vec<SubscriptionPlan>, FetchError>;
}

/// Identity lookup for a session credential
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// `Ok(None)` means the credential identifies nobody (treat as guest)
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, FetchError>;
}
