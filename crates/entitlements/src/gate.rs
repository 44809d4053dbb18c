//! Feature gate contract
//!
//! A gate wraps gated content. It blocks while the access check is loading,
//! renders the content only on a confirmed grant, and otherwise produces a
//! fallback carrying the upgrade messaging.

use investhub_shared::types::{PlanTier, User};
use serde::{Deserialize, Serialize};

use crate::access::{check_access, AccessPolicy, AccessSubject, FeatureAccessResult};
use crate::entitlement::Entitlements;

/// How a denied gate presents itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Replace the content with a full upgrade panel
    #[default]
    Full,
    /// Small inline upgrade prompt
    Inline,
    /// Blurred preview with an overlay prompt
    Blur,
}

/// What the presentation layer should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Access not yet known; show nothing gated
    Loading,
    /// Access confirmed
    Render,
    /// Access denied
    Fallback {
        mode: FallbackMode,
        required_tier: PlanTier,
        user_plan_label: String,
        message: String,
    },
}

impl GateDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GateDecision::Render)
    }
}

/// Gate for a single feature key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGate {
    feature_key: String,
    mode: FallbackMode,
}

impl FeatureGate {
    pub fn new(feature_key: impl Into<String>) -> Self {
        Self {
            feature_key: feature_key.into(),
            mode: FallbackMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: FallbackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn feature_key(&self) -> &str {
        &self.feature_key
    }

    /// Turn an access result into a presentation decision
    pub fn decide(&self, access: &FeatureAccessResult) -> GateDecision {
        if access.is_loading {
            return GateDecision::Loading;
        }
        if access.has_access {
            return GateDecision::Render;
        }
        GateDecision::Fallback {
            mode: self.mode,
            required_tier: access.required_plan_tier,
            user_plan_label: access.user_plan_label.clone(),
            message: access
                .upgrade_message
                .clone()
                .unwrap_or_else(|| crate::access::upgrade_message(access.required_plan_tier)),
        }
    }

    /// Run the access check and decide in one step
    pub fn evaluate(
        &self,
        user: Option<&User>,
        entitlements: Option<&Entitlements>,
        policy: &AccessPolicy,
    ) -> (FeatureAccessResult, GateDecision) {
        let subject = AccessSubject::for_user(user, entitlements);
        let access = check_access(&subject, &self.feature_key, policy);
        let decision = self.decide(&access);
        (access, decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PlanCatalog;
    use investhub_shared::types::{AppRole, SubscriptionPlan};

    fn free_catalog() -> PlanCatalog {
        PlanCatalog::new(vec![SubscriptionPlan::new("f", "Free", &["chat_rooms"])])
    }

    #[test]
    fn test_unresolved_user_blocks_on_loading() {
        let user = User::new("u1", AppRole::User);
        let gate = FeatureGate::new("chat_rooms");
        let (_, decision) = gate.evaluate(Some(&user), None, &AccessPolicy::default());
        assert_eq!(decision, GateDecision::Loading);
    }

    #[test]
    fn test_granted_feature_renders() {
        let user = User::new("u1", AppRole::User);
        let ent = Entitlements::from_catalog(&user, None, &free_catalog());
        let (_, decision) =
            FeatureGate::new("chat_rooms").evaluate(Some(&user), Some(&ent), &AccessPolicy::default());
        assert!(decision.is_render());
    }

    #[test]
    fn test_denied_feature_falls_back_with_mode() {
        let user = User::new("u1", AppRole::User);
        let ent = Entitlements::from_catalog(&user, None, &free_catalog());
        let gate = FeatureGate::new("pledge_pool").with_mode(FallbackMode::Blur);
        let (access, decision) = gate.evaluate(Some(&user), Some(&ent), &AccessPolicy::default());

        assert!(!access.has_access);
        match decision {
            GateDecision::Fallback {
                mode,
                required_tier,
                user_plan_label,
                message,
            } => {
                assert_eq!(mode, FallbackMode::Blur);
                assert_eq!(required_tier, PlanTier::Premium);
                assert_eq!(user_plan_label, "Free");
                assert!(message.contains("Premium"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_guest_never_renders() {
        let gate = FeatureGate::new("chat_rooms").with_mode(FallbackMode::Inline);
        let (_, decision) = gate.evaluate(None, None, &AccessPolicy::default());
        assert!(matches!(
            decision,
            GateDecision::Fallback {
                mode: FallbackMode::Inline,
                ..
            }
        ));
    }

    #[test]
    fn test_decision_serializes_with_tag() {
        let json = serde_json::to_value(GateDecision::Loading).unwrap();
        assert_eq!(json["decision"], "loading");
    }
}
