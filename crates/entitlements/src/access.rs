//! Feature access checks
//!
//! `check_access` answers "can this user use feature F right now" and, when
//! the answer is no, which tier to advertise. It is a pure function of the
//! subject, the feature key, the policy, and the static tier table.

use investhub_shared::types::{AppRole, PlanTier, User};
use serde::Serialize;

use crate::entitlement::{Entitlements, GUEST_PLAN_LABEL};
use crate::tiers::{required_tier, required_tier_or_default, DEFAULT_REQUIRED_TIER};

/// Label reported while entitlements are still being resolved
pub const LOADING_PLAN_LABEL: &str = "Loading";

/// Access policy knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Let unauthenticated visitors use Basic-tier features.
    /// Off by default: guests are denied every gated feature.
    pub guest_basic_access: bool,
}

/// Who is asking for access
#[derive(Debug, Clone, Copy)]
pub enum AccessSubject<'a> {
    /// No authenticated user
    Guest,
    /// An authenticated user, with entitlements if they have been resolved
    Member {
        role: &'a AppRole,
        entitlements: Option<&'a Entitlements>,
    },
}

impl<'a> AccessSubject<'a> {
    /// Build a subject from an optional user and whatever entitlement is at hand
    ///
    /// Entitlements that belong to somebody else are ignored, so a stale
    /// entitlement from a previous session reads as "not resolved yet".
    pub fn for_user(user: Option<&'a User>, entitlements: Option<&'a Entitlements>) -> Self {
        match user {
            None => AccessSubject::Guest,
            Some(user) => AccessSubject::Member {
                role: &user.app_role,
                entitlements: entitlements
                    .filter(|ent| ent.user_id.as_ref() == Some(&user.id)),
            },
        }
    }
}

/// Result of a single access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureAccessResult {
    pub feature_key: String,
    pub has_access: bool,
    pub user_plan_label: String,
    pub required_plan_tier: PlanTier,
    pub is_loading: bool,
    /// Present only when access is denied
    pub upgrade_message: Option<String>,
}

impl FeatureAccessResult {
    fn granted(feature_key: &str, user_plan_label: String) -> Self {
        Self {
            feature_key: feature_key.to_string(),
            has_access: true,
            user_plan_label,
            required_plan_tier: required_tier_or_default(feature_key),
            is_loading: false,
            upgrade_message: None,
        }
    }

    fn denied(feature_key: &str, user_plan_label: String, required_plan_tier: PlanTier) -> Self {
        Self {
            feature_key: feature_key.to_string(),
            has_access: false,
            user_plan_label,
            required_plan_tier,
            is_loading: false,
            upgrade_message: Some(upgrade_message(required_plan_tier)),
        }
    }

    fn loading(feature_key: &str) -> Self {
        Self {
            feature_key: feature_key.to_string(),
            has_access: false,
            user_plan_label: LOADING_PLAN_LABEL.to_string(),
            required_plan_tier: required_tier_or_default(feature_key),
            is_loading: true,
            upgrade_message: None,
        }
    }
}

/// "Upgrade to Premium to unlock this feature"
pub fn upgrade_message(tier: PlanTier) -> String {
    format!("Upgrade to {} to unlock this feature", tier.label())
}

/// Decide whether `subject` may use `feature_key`
pub fn check_access(
    subject: &AccessSubject<'_>,
    feature_key: &str,
    policy: &AccessPolicy,
) -> FeatureAccessResult {
    match subject {
        AccessSubject::Guest => {
            if policy.guest_basic_access && required_tier(feature_key) == Some(PlanTier::Basic) {
                return FeatureAccessResult::granted(feature_key, GUEST_PLAN_LABEL.to_string());
            }
            FeatureAccessResult::denied(
                feature_key,
                GUEST_PLAN_LABEL.to_string(),
                DEFAULT_REQUIRED_TIER,
            )
        }
        AccessSubject::Member { role, entitlements } => {
            // Role is re-checked here because the entitlement may be stale or partial
            if role.is_admin() {
                return FeatureAccessResult::granted(feature_key, role.to_string());
            }

            let Some(entitlements) = entitlements else {
                return FeatureAccessResult::loading(feature_key);
            };

            if entitlements.features.allows(feature_key) {
                FeatureAccessResult::granted(feature_key, entitlements.plan_label())
            } else {
                FeatureAccessResult::denied(
                    feature_key,
                    entitlements.plan_label(),
                    required_tier_or_default(feature_key),
                )
            }
        }
    }
}
