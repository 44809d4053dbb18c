//! Entitlement Module
//!
//! Provides a unified view of what a user can do based on their role and subscription.
//! This module answers the question: "Which gated features may this user use right now?"
//!
//! ## Design Principles
//!
//! 1. **Role first**: admin and super_admin short-circuit before any plan lookup
//! 2. **Deterministic**: `Entitlements::from_catalog()` is a pure function of its inputs
//! 3. **Debuggable**: every entitlement records the basis that produced it
//! 4. **Fail-open**: missing data degrades to the free tier, never to an error

use investhub_shared::types::{AppRole, Subscription, SubscriptionPlan, User, UserId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::access::{check_access, AccessPolicy, AccessSubject, FeatureAccessResult};
use crate::catalog::{PlanCatalog, PlanMatch};
use crate::features::FeatureSet;

/// Label reported for users without a resolved plan
pub const FREE_PLAN_LABEL: &str = "Free";

/// Label reported for unauthenticated visitors
pub const GUEST_PLAN_LABEL: &str = "Guest";

/// What determined an entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementBasis {
    /// No authenticated user
    Guest,
    /// Admin or super_admin role, no plan lookup performed
    RoleBypass,
    /// Active subscription joined to a catalog plan
    Subscription,
    /// No active subscription; the catalog's free/basic plan applies
    FreeTier,
    /// No plan could be resolved (unmatched label or no free plan)
    NoPlan,
}

impl std::fmt::Display for EntitlementBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntitlementBasis::Guest => write!(f, "guest"),
            EntitlementBasis::RoleBypass => write!(f, "role_bypass"),
            EntitlementBasis::Subscription => write!(f, "subscription"),
            EntitlementBasis::FreeTier => write!(f, "free_tier"),
            EntitlementBasis::NoPlan => write!(f, "no_plan"),
        }
    }
}

/// Resolved entitlement for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlements {
    /// Owner of this entitlement (`None` for guests)
    pub user_id: Option<UserId>,
    /// Role at resolution time (`None` for guests)
    pub role: Option<AppRole>,
    /// What determined this entitlement
    pub basis: EntitlementBasis,
    /// Authoritative active subscription, if any
    pub subscription: Option<Subscription>,
    /// Plan the subscription (or free tier) resolved to
    pub plan: Option<SubscriptionPlan>,
    /// Effective feature set after inheritance
    pub features: FeatureSet,
    /// Set when a fetch failed and the result fell back to less data
    pub degraded: bool,
    /// When this entitlement was computed
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
}

impl Entitlements {
    /// Entitlement of an unauthenticated visitor
    pub fn guest() -> Self {
        Self {
            user_id: None,
            role: None,
            basis: EntitlementBasis::Guest,
            subscription: None,
            plan: None,
            features: FeatureSet::empty(),
            degraded: false,
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    /// Entitlement of an admin or super_admin: every feature
    pub fn role_bypass(user: &User) -> Self {
        Self {
            user_id: Some(user.id.clone()),
            role: Some(user.app_role.clone()),
            basis: EntitlementBasis::RoleBypass,
            subscription: None,
            plan: None,
            features: FeatureSet::all(),
            degraded: false,
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    /// Pure function: compute entitlement from a subscription and the catalog
    pub fn from_catalog(
        user: &User,
        subscription: Option<Subscription>,
        catalog: &PlanCatalog,
    ) -> Self {
        let matched = catalog.match_subscription(subscription.as_ref());

        let basis = match matched {
            PlanMatch::Subscribed(_) => EntitlementBasis::Subscription,
            PlanMatch::FreeTier(_) => EntitlementBasis::FreeTier,
            PlanMatch::Unmatched => {
                if let Some(sub) = &subscription {
                    tracing::warn!(
                        user_id = %user.id,
                        plan_type = %sub.plan_type,
                        catalog_size = catalog.len(),
                        "Subscription plan_type matches no catalog plan"
                    );
                }
                EntitlementBasis::NoPlan
            }
            PlanMatch::NoFreePlan => {
                tracing::debug!(
                    user_id = %user.id,
                    catalog_size = catalog.len(),
                    "No free or basic plan in catalog"
                );
                EntitlementBasis::NoPlan
            }
        };

        let plan = matched.plan();
        let features = plan
            .map(|plan| catalog.effective_features(plan))
            .unwrap_or_default();

        Self {
            user_id: Some(user.id.clone()),
            role: Some(user.app_role.clone()),
            basis,
            subscription,
            plan: plan.cloned(),
            features,
            degraded: false,
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    /// Mark the entitlement as computed from incomplete data
    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    pub fn is_guest(&self) -> bool {
        self.basis == EntitlementBasis::Guest
    }

    /// Human-readable plan label for upgrade prompts
    pub fn plan_label(&self) -> String {
        match (&self.basis, &self.plan, &self.subscription, &self.role) {
            (EntitlementBasis::Guest, _, _, _) => GUEST_PLAN_LABEL.to_string(),
            (EntitlementBasis::RoleBypass, _, _, Some(role)) => role.to_string(),
            (_, Some(plan), _, _) => plan.name.clone(),
            (_, None, Some(sub), _) => sub.plan_type.clone(),
            _ => FREE_PLAN_LABEL.to_string(),
        }
    }

    /// Full access check for this entitlement's owner
    pub fn check(&self, feature_key: &str, policy: &AccessPolicy) -> FeatureAccessResult {
        let subject = match &self.role {
            Some(role) => AccessSubject::Member {
                role,
                entitlements: Some(self),
            },
            None => AccessSubject::Guest,
        };
        check_access(&subject, feature_key, policy)
    }
}
