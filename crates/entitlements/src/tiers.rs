//! Static feature-to-tier table
//!
//! Tiers only drive "upgrade to X" messaging. Access itself is decided from
//! the plan feature lists, never from this table.

use investhub_shared::types::PlanTier;
use serde::Serialize;

/// Features available from the Basic tier upward
pub const BASIC_FEATURES: &[&str] = &[
    "chat_rooms",
    "polls",
    "community_feed",
    "events",
    "basic_alerts",
];

/// Features that require at least Premium
pub const PREMIUM_FEATURES: &[&str] = &[
    "advisor_subscriptions",
    "advisor_picks",
    "premium_chat_rooms",
    "pledge_pool",
    "advanced_polls",
    "portfolio_tracking",
    "finfluencer_content",
];

/// Features reserved for VIP
pub const VIP_FEATURES: &[&str] = &[
    "vip_chat_rooms",
    "one_on_one_advisor",
    "exclusive_events",
    "early_access",
    "priority_support",
];

/// Tier assumed for feature keys missing from the table
pub const DEFAULT_REQUIRED_TIER: PlanTier = PlanTier::Premium;

/// Minimum tier for a known feature key
pub fn required_tier(feature_key: &str) -> Option<PlanTier> {
    if BASIC_FEATURES.contains(&feature_key) {
        Some(PlanTier::Basic)
    } else if PREMIUM_FEATURES.contains(&feature_key) {
        Some(PlanTier::Premium)
    } else if VIP_FEATURES.contains(&feature_key) {
        Some(PlanTier::Vip)
    } else {
        None
    }
}

/// Minimum tier for any feature key, defaulting to Premium
pub fn required_tier_or_default(feature_key: &str) -> PlanTier {
    required_tier(feature_key).unwrap_or(DEFAULT_REQUIRED_TIER)
}

/// One row of the tier table, as published to clients
#[derive(Debug, Clone, Serialize)]
pub struct TierFeatures {
    pub tier: PlanTier,
    pub label: &'static str,
    pub features: &'static [&'static str],
}

/// Table row for a single tier
pub fn tier_features(tier: PlanTier) -> TierFeatures {
    let features = match tier {
        PlanTier::Basic => BASIC_FEATURES,
        PlanTier::Premium => PREMIUM_FEATURES,
        PlanTier::Vip => VIP_FEATURES,
    };
    TierFeatures {
        tier,
        label: tier.label(),
        features,
    }
}

/// The full table, lowest tier first
pub fn tier_table() -> Vec<TierFeatures> {
    [PlanTier::Basic, PlanTier::Premium, PlanTier::Vip]
        .into_iter()
        .map(tier_features)
        .collect()
}
