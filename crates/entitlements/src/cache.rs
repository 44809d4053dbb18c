//! In-memory entitlement cache with TTL
//!
//! Holds one session's resolved entitlement and the plan catalog it was
//! computed from, plus the in-flight flag and generation counter that
//! coordinate concurrent resolutions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use investhub_shared::types::UserId;
use serde::Serialize;

use crate::catalog::PlanCatalog;
use crate::entitlement::Entitlements;

/// Default cache TTL (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache entry with expiration
#[derive(Clone)]
struct CacheEntry<T> {
    value: T,
    /// `None` when the TTL is too large to represent: the entry never expires
    expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Releases the in-flight flag when dropped, including when the owning
/// future is dropped mid-resolution
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Thread-safe session entitlement cache
pub struct EntitlementCache {
    entitlements: RwLock<Option<CacheEntry<Arc<Entitlements>>>>,
    catalog: RwLock<Option<CacheEntry<Arc<PlanCatalog>>>>,
    /// Bumped on every invalidation; writes tagged with an older value are dropped
    generation: AtomicU64,
    in_flight: AtomicBool,
    entitlement_ttl: Duration,
    catalog_ttl: Duration,
}

impl Default for EntitlementCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitlementCache {
    /// Create a new cache with default TTLs
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL, DEFAULT_CACHE_TTL)
    }

    /// Create a new cache with custom TTLs
    pub fn with_ttl(entitlement_ttl: Duration, catalog_ttl: Duration) -> Self {
        Self {
            entitlements: RwLock::new(None),
            catalog: RwLock::new(None),
            generation: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            entitlement_ttl,
            catalog_ttl,
        }
    }

    /// Fresh cached entitlement for `user_id`
    pub fn get(&self, user_id: &UserId) -> Option<Arc<Entitlements>> {
        let cache = self.entitlements.read().ok()?;
        let entry = cache.as_ref()?;

        if entry.is_expired() || entry.value.user_id.as_ref() != Some(user_id) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    /// Cached entitlement for `user_id` regardless of age
    pub fn get_stale(&self, user_id: &UserId) -> Option<Arc<Entitlements>> {
        let cache = self.entitlements.read().ok()?;
        let entry = cache.as_ref()?;
        (entry.value.user_id.as_ref() == Some(user_id)).then(|| entry.value.clone())
    }

    /// Cache an entitlement computed under `generation`
    ///
    /// Returns false (and writes nothing) if the cache was invalidated after
    /// that generation began.
    pub fn store(&self, generation: u64, entitlements: Arc<Entitlements>) -> bool {
        let Ok(mut cache) = self.entitlements.write() else {
            return false;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        *cache = Some(CacheEntry::new(entitlements, self.entitlement_ttl));
        true
    }

    /// Fresh cached plan catalog
    pub fn catalog(&self) -> Option<Arc<PlanCatalog>> {
        let cache = self.catalog.read().ok()?;
        let entry = cache.as_ref()?;

        if entry.is_expired() {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    /// Last cached plan catalog regardless of age
    pub fn stale_catalog(&self) -> Option<Arc<PlanCatalog>> {
        let cache = self.catalog.read().ok()?;
        cache.as_ref().map(|entry| entry.value.clone())
    }

    /// Cache a plan catalog fetched under `generation`
    pub fn store_catalog(&self, generation: u64, catalog: Arc<PlanCatalog>) -> bool {
        let Ok(mut cache) = self.catalog.write() else {
            return false;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        *cache = Some(CacheEntry::new(catalog, self.catalog_ttl));
        true
    }

    /// Drop the cached entitlement and catalog; returns the new generation
    pub fn invalidate(&self) -> u64 {
        // Lock order: entitlements, then catalog
        let mut entitlements = self.entitlements.write().ok();
        let mut catalog = self.catalog.write().ok();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(entitlements) = entitlements.as_mut() {
            **entitlements = None;
        }
        if let Some(catalog) = catalog.as_mut() {
            **catalog = None;
        }
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Claim the single in-flight resolution slot
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: &self.in_flight,
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (entitlement_cached, entitlement_expired) = self
            .entitlements
            .read()
            .ok()
            .and_then(|cache| cache.as_ref().map(|e| (true, e.is_expired())))
            .unwrap_or((false, false));
        let (catalog_plans, catalog_expired) = self
            .catalog
            .read()
            .ok()
            .and_then(|cache| cache.as_ref().map(|e| (Some(e.value.len()), e.is_expired())))
            .unwrap_or((None, false));

        CacheStats {
            entitlement_cached,
            entitlement_expired,
            catalog_plans,
            catalog_expired,
            generation: self.generation(),
            in_flight: self.is_in_flight(),
        }
    }
}

/// Cache statistics
#[derive(Default, Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entitlement_cached: bool,
    pub entitlement_expired: bool,
    pub catalog_plans: Option<usize>,
    pub catalog_expired: bool,
    pub generation: u64,
    pub in_flight: bool,
}
