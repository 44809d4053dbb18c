//! Entitlement resolver
//!
//! Produces a user's effective feature set and keeps it current for the
//! lifetime of a session without re-fetching plan or subscription data on
//! every check.
//!
//! ## Resolution order
//!
//! 1. Guest: empty set, no fetches
//! 2. Admin / super_admin: wildcard set, no fetches
//! 3. Fresh cache hit: returned as-is, no fetches
//! 4. Otherwise fetch the subscription and (if not cached) the plan catalog,
//!    join them, walk inheritance, and cache the result
//!
//! Every fetch is individually fault tolerant. A failed subscription fetch
//! degrades to "no active subscription"; a failed catalog fetch falls back to
//! the last cached catalog, else to an empty one. Cancellation produces
//! `ResolveOutcome::Cancelled` and never touches the cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use investhub_shared::types::{Subscription, User, UserId};
use tokio_util::sync::CancellationToken;

use crate::access::{AccessPolicy, AccessSubject, FeatureAccessResult};
use crate::cache::{EntitlementCache, DEFAULT_CACHE_TTL};
use crate::catalog::PlanCatalog;
use crate::entitlement::Entitlements;
use crate::error::FetchError;
use crate::features::FeatureSet;
use crate::source::{PlanSource, SubscriptionSource};

/// Default bound on a single fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a resolved entitlement stays fresh
    pub entitlement_ttl: Duration,
    /// How long the plan catalog stays fresh
    pub catalog_ttl: Duration,
    /// Upper bound for each individual fetch
    pub fetch_timeout: Duration,
    /// Delay before the subscription fetch (zero disables)
    pub subscription_stagger: Duration,
    /// Delay before the catalog fetch (zero disables)
    pub catalog_stagger: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            entitlement_ttl: DEFAULT_CACHE_TTL,
            catalog_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            subscription_stagger: Duration::ZERO,
            catalog_stagger: Duration::ZERO,
        }
    }
}

impl ResolverConfig {
    /// Create config from environment variables
    ///
    /// - `ENTITLEMENT_CACHE_TTL_SECS` (default: 300)
    /// - `PLAN_CATALOG_TTL_SECS` (default: 300)
    /// - `ENTITLEMENT_FETCH_TIMEOUT_MS` (default: 10000)
    /// - `ENTITLEMENT_STAGGER_MS`: delay before the subscription fetch; the
    ///   catalog fetch waits the same amount again (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let stagger = env_u64("ENTITLEMENT_STAGGER_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.subscription_stagger);

        Self {
            entitlement_ttl: env_u64("ENTITLEMENT_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.entitlement_ttl),
            catalog_ttl: env_u64("PLAN_CATALOG_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.catalog_ttl),
            fetch_timeout: env_u64("ENTITLEMENT_FETCH_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
            subscription_stagger: stagger,
            catalog_stagger: stagger,
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Result of a resolution request
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// Freshly computed
    Resolved(Arc<Entitlements>),
    /// Served from the cache without fetching
    Cached(Arc<Entitlements>),
    /// Another resolution was in flight; this request was dropped.
    /// Carries the last cached entitlement for the user, if any.
    Busy(Option<Arc<Entitlements>>),
    /// The caller cancelled before resolution finished
    Cancelled,
}

impl ResolveOutcome {
    pub fn entitlements(&self) -> Option<&Arc<Entitlements>> {
        match self {
            ResolveOutcome::Resolved(ent) | ResolveOutcome::Cached(ent) => Some(ent),
            ResolveOutcome::Busy(ent) => ent.as_ref(),
            ResolveOutcome::Cancelled => None,
        }
    }

    /// The effective feature set, empty when nothing is known yet
    pub fn features(&self) -> FeatureSet {
        self.entitlements()
            .map(|ent| ent.features.clone())
            .unwrap_or_default()
    }

    /// True when the caller has nothing to decide on yet
    pub fn is_loading(&self) -> bool {
        self.entitlements().is_none()
    }
}

/// Session-scoped entitlement resolver
pub struct EntitlementResolver {
    subscriptions: Arc<dyn SubscriptionSource>,
    plans: Arc<dyn PlanSource>,
    cache: Arc<EntitlementCache>,
    config: ResolverConfig,
}

impl EntitlementResolver {
    /// Create a resolver with its own cache
    pub fn new(
        subscriptions: Arc<dyn SubscriptionSource>,
        plans: Arc<dyn PlanSource>,
        config: ResolverConfig,
    ) -> Self {
        let cache = Arc::new(EntitlementCache::with_ttl(
            config.entitlement_ttl,
            config.catalog_ttl,
        ));
        Self::with_cache(subscriptions, plans, config, cache)
    }

    /// Create a resolver around an injected cache
    pub fn with_cache(
        subscriptions: Arc<dyn SubscriptionSource>,
        plans: Arc<dyn PlanSource>,
        config: ResolverConfig,
        cache: Arc<EntitlementCache>,
    ) -> Self {
        Self {
            subscriptions,
            plans,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &EntitlementCache {
        &self.cache
    }

    /// Resolve the effective entitlement for `user` (`None` = guest)
    pub async fn resolve(&self, user: Option<&User>, cancel: &CancellationToken) -> ResolveOutcome {
        let Some(user) = user else {
            return ResolveOutcome::Resolved(Arc::new(Entitlements::guest()));
        };

        if user.app_role.is_admin() {
            tracing::debug!(user_id = %user.id, role = %user.app_role, "Role bypass, skipping plan lookup");
            return ResolveOutcome::Resolved(Arc::new(Entitlements::role_bypass(user)));
        }

        if let Some(cached) = self.cache.get(&user.id) {
            return ResolveOutcome::Cached(cached);
        }

        let Some(_guard) = self.cache.try_begin() else {
            tracing::debug!(user_id = %user.id, "Entitlement resolution already in flight, dropping request");
            return ResolveOutcome::Busy(self.cache.get_stale(&user.id));
        };

        // A resolution may have completed between the cache check and the claim
        if let Some(cached) = self.cache.get(&user.id) {
            return ResolveOutcome::Cached(cached);
        }

        let generation = self.cache.generation();

        let Some((subscription, subscription_degraded)) =
            self.load_subscription(&user.id, cancel).await
        else {
            return ResolveOutcome::Cancelled;
        };

        let Some((catalog, catalog_degraded)) = self.load_catalog(generation, cancel).await else {
            return ResolveOutcome::Cancelled;
        };

        let degraded = subscription_degraded || catalog_degraded;
        let entitlements = Arc::new(
            Entitlements::from_catalog(user, subscription, &catalog).with_degraded(degraded),
        );

        tracing::debug!(
            user_id = %user.id,
            basis = %entitlements.basis,
            plan = %entitlements.plan_label(),
            features = entitlements.features.len(),
            degraded,
            "Entitlements resolved"
        );

        // Degraded results are served but not cached, so the next request retries
        if !degraded && !self.cache.store(generation, entitlements.clone()) {
            tracing::debug!(
                user_id = %user.id,
                generation,
                "Cache invalidated during resolution, discarding result"
            );
        }

        ResolveOutcome::Resolved(entitlements)
    }

    /// Clear the cached entitlement and catalog, then resolve again
    ///
    /// Call after anything that changes a user's subscription (checkout,
    /// cancellation, admin plan edits).
    pub async fn invalidate(&self, user: Option<&User>, cancel: &CancellationToken) -> ResolveOutcome {
        let generation = self.cache.invalidate();
        let user_id = user.map_or("guest", |u| u.id.as_str());
        tracing::info!(user_id, generation, "Entitlement cache invalidated");
        self.resolve(user, cancel).await
    }

    /// Cached entitlement for `user_id` without fetching
    pub fn snapshot(&self, user_id: &UserId) -> Option<Arc<Entitlements>> {
        self.cache.get(user_id)
    }

    /// Synchronous access check against whatever is cached right now
    ///
    /// An authenticated user with nothing cached reads as "loading".
    pub fn check_access(
        &self,
        user: Option<&User>,
        feature_key: &str,
        policy: &AccessPolicy,
    ) -> FeatureAccessResult {
        let snapshot = user.and_then(|u| self.snapshot(&u.id));
        let subject = AccessSubject::for_user(user, snapshot.as_deref());
        crate::access::check_access(&subject, feature_key, policy)
    }

    /// Authoritative subscription; `None` from this function means cancelled
    async fn load_subscription(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Option<(Option<Subscription>, bool)> {
        if !self.pause(self.config.subscription_stagger, cancel).await {
            return None;
        }

        match self
            .bounded(cancel, self.subscriptions.active_subscriptions(user_id))
            .await
        {
            Ok(mut subscriptions) => {
                subscriptions.retain(|s| s.status.is_active());
                // Stable: ties keep the source's order
                subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Some((subscriptions.into_iter().next(), false))
            }
            Err(FetchError::Cancelled) => None,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Subscription fetch failed, treating user as unsubscribed"
                );
                Some((None, true))
            }
        }
    }

    /// Plan catalog; `None` from this function means cancelled
    async fn load_catalog(
        &self,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Option<(Arc<PlanCatalog>, bool)> {
        if let Some(catalog) = self.cache.catalog() {
            return Some((catalog, false));
        }

        if !self.pause(self.config.catalog_stagger, cancel).await {
            return None;
        }

        match self.bounded(cancel, self.plans.plan_catalog()).await {
            Ok(plans) => {
                let catalog = Arc::new(PlanCatalog::new(plans));
                self.cache.store_catalog(generation, catalog.clone());
                Some((catalog, false))
            }
            Err(FetchError::Cancelled) => None,
            Err(e) => match self.cache.stale_catalog() {
                Some(stale) => {
                    tracing::warn!(
                        error = %e,
                        plans = stale.len(),
                        "Plan catalog fetch failed, using previously cached catalog"
                    );
                    Some((stale, true))
                }
                None => {
                    tracing::warn!(
                        error = %e,
                        "Plan catalog fetch failed and nothing is cached, using empty catalog"
                    );
                    Some((Arc::new(PlanCatalog::empty()), true))
                }
            },
        }
    }

    /// Run a fetch under the cancellation token and the fetch timeout
    async fn bounded<T, F>(&self, cancel: &CancellationToken, fetch: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.config.fetch_timeout, fetch) => match result {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            },
        }
    }

    /// Cancellable delay; false if cancelled
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
