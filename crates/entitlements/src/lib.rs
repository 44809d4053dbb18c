//! InvestHub Entitlements
//!
//! Resolves which features a user may use from their subscription and the
//! plan catalog, caches the result per session, and answers feature access
//! checks for gated content.

pub mod access;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod entitlement;
pub mod error;
pub mod features;
pub mod gate;
pub mod memory;
pub mod resolver;
pub mod source;
pub mod store;
pub mod tiers;

pub use access::{check_access, AccessPolicy, AccessSubject, FeatureAccessResult};
pub use cache::{CacheStats, EntitlementCache};
pub use catalog::{normalize_plan_name, PlanCatalog, PlanMatch};
pub use client::EntityApiClient;
pub use entitlement::{EntitlementBasis, Entitlements};
pub use error::{EntitlementError, EntitlementResult, FetchError};
pub use features::{FeatureSet, WILDCARD_FEATURE};
pub use gate::{FallbackMode, FeatureGate, GateDecision};
pub use memory::InMemorySource;
pub use resolver::{EntitlementResolver, ResolveOutcome, ResolverConfig};
pub use source::{IdentitySource, PlanSource, SubscriptionSource};
pub use store::PgEntitlementStore;
pub use tiers::{required_tier, required_tier_or_default, tier_features, tier_table, TierFeatures};
