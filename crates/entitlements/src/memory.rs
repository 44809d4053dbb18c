//! In-memory data source (for development and tests without a backing store)
//!
//! Counts calls and can inject latency or failures, which makes resolver
//! behaviour observable without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use investhub_shared::types::{Subscription, SubscriptionPlan, User, UserId};

use crate::error::FetchError;
use crate::source::{IdentitySource, PlanSource, SubscriptionSource};

#[derive(Default)]
pub struct InMemorySource {
    plans: RwLock<Vec<SubscriptionPlan>>,
    subscriptions: RwLock<Vec<Subscription>>,
    /// access token -> user
    sessions: RwLock<HashMap<String, User>>,
    latency: RwLock<Duration>,
    fail_subscriptions: AtomicBool,
    fail_catalog: AtomicBool,
    subscription_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plans(plans: Vec<SubscriptionPlan>) -> Self {
        let source = Self::new();
        source.set_plans(plans);
        source
    }

    pub fn set_plans(&self, plans: Vec<SubscriptionPlan>) {
        if let Ok(mut current) = self.plans.write() {
            *current = plans;
        }
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        if let Ok(mut subs) = self.subscriptions.write() {
            subs.push(subscription);
        }
    }

    pub fn add_session(&self, access_token: &str, user: User) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(access_token.to_string(), user);
        }
    }

    /// Delay applied before every fetch completes
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_catalog(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    pub fn subscription_calls(&self) -> usize {
        self.subscription_calls.load(Ordering::SeqCst)
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.latency.read().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl SubscriptionSource for InMemorySource {
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>, FetchError> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("simulated subscription outage".to_string()));
        }

        let mut subs: Vec<Subscription> = self
            .subscriptions
            .read()
            .map(|subs| {
                subs.iter()
                    .filter(|s| &s.user_id == user_id && s.status.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }
}

#[async_trait]
impl PlanSource for InMemorySource {
    async fn plan_catalog(&self) -> Result<Vec<SubscriptionPlan>, FetchError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                body: "simulated catalog outage".to_string(),
            });
        }

        Ok(self.plans.read().map(|p| p.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl IdentitySource for InMemorySource {
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, FetchError> {
        Ok(self
            .sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(access_token).cloned()))
    }
}
