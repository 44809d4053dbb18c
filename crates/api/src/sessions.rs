//! Per-user entitlement sessions
//!
//! Each authenticated user gets their own [`EntitlementResolver`] (and with
//! it their own cache). Sessions that go unused for longer than the idle
//! window are dropped by [`SessionRegistry::sweep_idle`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use investhub_entitlements::{
    EntitlementResolver, PlanSource, ResolveOutcome, ResolverConfig, SubscriptionSource,
};
use investhub_shared::types::{User, UserId};
use tokio_util::sync::CancellationToken;

struct Session {
    resolver: Arc<EntitlementResolver>,
    last_seen: Instant,
}

/// Registry of live entitlement sessions keyed by user
pub struct SessionRegistry {
    subscriptions: Arc<dyn SubscriptionSource>,
    plans: Arc<dyn PlanSource>,
    config: ResolverConfig,
    idle: Duration,
    /// Serves guests and admins, neither of which touches a cache
    anonymous: Arc<EntitlementResolver>,
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl SessionRegistry {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionSource>,
        plans: Arc<dyn PlanSource>,
        config: ResolverConfig,
        idle: Duration,
    ) -> Self {
        let anonymous = Arc::new(EntitlementResolver::new(
            subscriptions.clone(),
            plans.clone(),
            config.clone(),
        ));
        Self {
            subscriptions,
            plans,
            config,
            idle,
            anonymous,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver for `user`, creating the session on first use
    pub fn resolver_for(&self, user: Option<&User>) -> Arc<EntitlementResolver> {
        let Some(user) = user.filter(|u| !u.app_role.is_admin()) else {
            return self.anonymous.clone();
        };

        let Ok(mut sessions) = self.sessions.write() else {
            // Poisoned registry: fall back to an unregistered resolver
            return Arc::new(self.new_resolver());
        };

        let session = sessions.entry(user.id.clone()).or_insert_with(|| {
            tracing::debug!(user_id = %user.id, "Opening entitlement session");
            Session {
                resolver: Arc::new(self.new_resolver()),
                last_seen: Instant::now(),
            }
        });
        session.last_seen = Instant::now();
        session.resolver.clone()
    }

    /// Existing session resolver, without creating or touching it
    pub fn get(&self, user_id: &UserId) -> Option<Arc<EntitlementResolver>> {
        self.sessions
            .read()
            .ok()?
            .get(user_id)
            .map(|s| s.resolver.clone())
    }

    pub async fn resolve(&self, user: Option<&User>, cancel: &CancellationToken) -> ResolveOutcome {
        self.resolver_for(user).resolve(user, cancel).await
    }

    pub async fn invalidate(&self, user: Option<&User>, cancel: &CancellationToken) -> ResolveOutcome {
        self.resolver_for(user).invalidate(user, cancel).await
    }

    /// End a user's session (logout)
    pub fn remove(&self, user_id: &UserId) -> bool {
        self.sessions
            .write()
            .map(|mut sessions| sessions.remove(user_id).is_some())
            .unwrap_or(false)
    }

    /// Drop sessions idle longer than the configured window; returns how many
    pub fn sweep_idle(&self) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen.elapsed() <= self.idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_resolver(&self) -> EntitlementResolver {
        EntitlementResolver::new(
            self.subscriptions.clone(),
            self.plans.clone(),
            self.config.clone(),
        )
    }
}

/// Periodically evict idle sessions until `shutdown` fires
pub async fn run_session_sweeper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = registry.sweep_idle();
                if evicted > 0 {
                    tracing::info!(evicted, remaining = registry.len(), "Evicted idle entitlement sessions");
                }
            }
        }
    }

    tracing::debug!("Session sweeper stopped");
}
