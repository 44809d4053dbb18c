//! Plan catalog
//!
//! Indexes subscription plans by id, joins subscription labels to plans, and
//! walks plan inheritance to build the effective feature set.
//!
//! Plan inheritance is a weak reference (`inherits_from_plan_id`) maintained by
//! administrators, so the walk tolerates dangling parents and cycles.

use std::collections::{HashMap, HashSet};

use investhub_shared::types::{PlanId, Subscription, SubscriptionPlan};

use crate::features::FeatureSet;

/// Plan names that identify the implicit plan of unsubscribed users
pub const FREE_PLAN_NAMES: &[&str] = &["free", "basic"];

/// Outcome of joining a user's subscription to the catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanMatch<'a> {
    /// The subscription resolved to a catalog plan
    Subscribed(&'a SubscriptionPlan),
    /// No subscription; the catalog's free/basic plan applies
    FreeTier(&'a SubscriptionPlan),
    /// The subscription's `plan_type` matched nothing in the catalog
    Unmatched,
    /// No subscription and the catalog has no free/basic plan
    NoFreePlan,
}

impl<'a> PlanMatch<'a> {
    pub fn plan(&self) -> Option<&'a SubscriptionPlan> {
        match self {
            PlanMatch::Subscribed(plan) | PlanMatch::FreeTier(plan) => Some(plan),
            PlanMatch::Unmatched | PlanMatch::NoFreePlan => None,
        }
    }
}

/// Lowercase a plan name and collapse whitespace runs into `_`
///
/// `"Premium  Plan"` becomes `"premium_plan"`.
pub fn normalize_plan_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Read-only view of the subscription plan catalog
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<SubscriptionPlan>,
    by_id: HashMap<PlanId, usize>,
}

impl PlanCatalog {
    /// Build a catalog; when ids repeat, the first plan wins
    pub fn new(plans: Vec<SubscriptionPlan>) -> Self {
        let mut by_id = HashMap::with_capacity(plans.len());
        for (idx, plan) in plans.iter().enumerate() {
            by_id.entry(plan.id.clone()).or_insert(idx);
        }
        Self { plans, by_id }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn plans(&self) -> &[SubscriptionPlan] {
        &self.plans
    }

    pub fn get(&self, id: &PlanId) -> Option<&SubscriptionPlan> {
        self.by_id.get(id).map(|&idx| &self.plans[idx])
    }

    /// Find the plan a free-text subscription label refers to
    ///
    /// The label is lowercased and compared against each plan name both as
    /// lowercased text and in its underscore-normalized form. The label itself
    /// is not normalized, so `"Premium Plan"` does not match a plan named
    /// `"Premium"` and `"premium_plan"` does match `"Premium Plan"`.
    pub fn find_by_label(&self, plan_type: &str) -> Option<&SubscriptionPlan> {
        let wanted = plan_type.to_lowercase();
        self.plans.iter().find(|plan| {
            plan.name.to_lowercase() == wanted || normalize_plan_name(&plan.name) == wanted
        })
    }

    /// The implicit plan of users without an active subscription
    pub fn free_plan(&self) -> Option<&SubscriptionPlan> {
        self.plans
            .iter()
            .find(|plan| FREE_PLAN_NAMES.contains(&plan.name.to_lowercase().as_str()))
    }

    /// Join a subscription (or its absence) to a catalog plan
    ///
    /// A stable `plan_id` on the subscription wins when it resolves; the
    /// label match is the fallback for records that predate the foreign key.
    pub fn match_subscription(&self, subscription: Option<&Subscription>) -> PlanMatch<'_> {
        match subscription {
            Some(sub) => {
                let by_id = sub.plan_id.as_ref().and_then(|id| self.get(id));
                match by_id.or_else(|| self.find_by_label(&sub.plan_type)) {
                    Some(plan) => PlanMatch::Subscribed(plan),
                    None => PlanMatch::Unmatched,
                }
            }
            None => match self.free_plan() {
                Some(plan) => PlanMatch::FreeTier(plan),
                None => PlanMatch::NoFreePlan,
            },
        }
    }

    /// Union of the plan's features and those of every ancestor
    ///
    /// Stops at a plan without a parent, at a parent id missing from the
    /// catalog, or at the first plan visited twice.
    pub fn effective_features(&self, plan: &SubscriptionPlan) -> FeatureSet {
        let mut features = FeatureSet::empty();
        let mut visited: HashSet<&PlanId> = HashSet::new();
        let mut current = Some(plan);

        while let Some(plan) = current {
            if !visited.insert(&plan.id) {
                tracing::warn!(
                    plan_id = %plan.id,
                    plan_name = %plan.name,
                    "Plan inheritance cycle detected, stopping traversal"
                );
                break;
            }
            features.extend(&plan.features);
            current = plan
                .inherits_from_plan_id
                .as_ref()
                .and_then(|parent| self.get(parent));
        }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(plans: Vec<SubscriptionPlan>) -> PlanCatalog {
        PlanCatalog::new(plans)
    }

    #[test]
    fn test_normalize_plan_name() {
        assert_eq!(normalize_plan_name("Premium Plan"), "premium_plan");
        assert_eq!(normalize_plan_name("  VIP   Elite "), "vip_elite");
        assert_eq!(normalize_plan_name("free"), "free");
    }

    #[test]
    fn test_label_matching_is_case_insensitive() {
        let c = catalog(vec![SubscriptionPlan::new("p1", "Premium", &["advisor_picks"])]);
        assert!(c.find_by_label("premium").is_some());
        assert!(c.find_by_label("PREMIUM").is_some());
    }

    #[test]
    fn test_label_matches_underscored_plan_name() {
        let c = catalog(vec![SubscriptionPlan::new("p1", "Premium Plan", &[])]);
        assert!(c.find_by_label("premium_plan").is_some());
        assert!(c.find_by_label("Premium Plan").is_some());
    }

    #[test]
    fn test_mismatched_label_does_not_resolve() {
        let c = catalog(vec![
            SubscriptionPlan::new("p_free", "Free", &["chat_rooms"]),
            SubscriptionPlan::new("p_premium", "Premium", &["advisor_picks"]).inheriting("p_free"),
        ]);
        let sub = Subscription::active("u1", "Premium Plan");
        assert_eq!(c.match_subscription(Some(&sub)), PlanMatch::Unmatched);
    }

    #[test]
    fn test_plan_id_preferred_over_label() {
        let c = catalog(vec![
            SubscriptionPlan::new("p_basic", "Basic", &["chat_rooms"]),
            SubscriptionPlan::new("p_vip", "VIP", &["vip_chat_rooms"]),
        ]);
        let mut sub = Subscription::active("u1", "basic");
        sub.plan_id = Some(PlanId::from("p_vip"));

        let matched = c.match_subscription(Some(&sub)).plan().unwrap();
        assert_eq!(matched.name, "VIP");
    }

    #[test]
    fn test_dangling_plan_id_falls_back_to_label() {
        let c = catalog(vec![SubscriptionPlan::new("p_basic", "Basic", &["chat_rooms"])]);
        let mut sub = Subscription::active("u1", "basic");
        sub.plan_id = Some(PlanId::from("deleted_plan"));

        let matched = c.match_subscription(Some(&sub)).plan().unwrap();
        assert_eq!(matched.id, PlanId::from("p_basic"));
    }

    #[test]
    fn test_free_plan_fallback() {
        let c = catalog(vec![
            SubscriptionPlan::new("p_premium", "Premium", &[]),
            SubscriptionPlan::new("p_basic", "BASIC", &["chat_rooms"]),
        ]);
        match c.match_subscription(None) {
            PlanMatch::FreeTier(plan) => assert_eq!(plan.id, PlanId::from("p_basic")),
            other => panic!("expected free tier, got {:?}", other),
        }

        let no_free = catalog(vec![SubscriptionPlan::new("p_premium", "Premium", &[])]);
        assert_eq!(no_free.match_subscription(None), PlanMatch::NoFreePlan);
    }

    #[test]
    fn test_inheritance_union_three_levels() {
        let c = catalog(vec![
            SubscriptionPlan::new("a", "A", &["x", "shared"]).inheriting("b"),
            SubscriptionPlan::new("b", "B", &["y", "shared"]).inheriting("c"),
            SubscriptionPlan::new("c", "C", &["z", "shared"]),
        ]);
        let a = c.get(&PlanId::from("a")).unwrap();
        let features = c.effective_features(a);

        let expected: FeatureSet = ["x", "y", "z", "shared"].into_iter().collect();
        assert_eq!(features, expected);
        assert_eq!(features.len(), 4);
    }

    #[test]
    fn test_inheritance_cycle_terminates() {
        let c = catalog(vec![
            SubscriptionPlan::new("a", "A", &["x"]).inheriting("b"),
            SubscriptionPlan::new("b", "B", &["y"]).inheriting("a"),
        ]);
        let a = c.get(&PlanId::from("a")).unwrap();
        let features = c.effective_features(a);

        let expected: FeatureSet = ["x", "y"].into_iter().collect();
        assert_eq!(features, expected);
    }

    #[test]
    fn test_self_parent_terminates() {
        let c = catalog(vec![SubscriptionPlan::new("a", "A", &["x"]).inheriting("a")]);
        let a = c.get(&PlanId::from("a")).unwrap();
        assert_eq!(c.effective_features(a).len(), 1);
    }

    #[test]
    fn test_dangling_parent_stops_walk() {
        let c = catalog(vec![SubscriptionPlan::new("a", "A", &["x"]).inheriting("gone")]);
        let a = c.get(&PlanId::from("a")).unwrap();
        let expected: FeatureSet = ["x"].into_iter().collect();
        assert_eq!(c.effective_features(a), expected);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let c = catalog(vec![
            SubscriptionPlan::new("a", "First", &[]),
            SubscriptionPlan::new("a", "Second", &[]),
        ]);
        assert_eq!(c.get(&PlanId::from("a")).unwrap().name, "First");
        assert_eq!(c.len(), 2);
    }
}
