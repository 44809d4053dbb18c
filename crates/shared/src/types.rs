//! Common types used across InvestHub

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::InvestHubError;

// =============================================================================
// ID Wrappers
// =============================================================================

/// User ID wrapper
///
/// Entity API ids are opaque strings (not necessarily UUIDs), so every id
/// wrapper holds a `String`. `new()` mints a UUID-shaped id for local records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription plan ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for PlanId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription record ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Platform-wide role of a user
///
/// Unknown role strings are kept verbatim in `Other` and carry no privileges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppRole {
    User,
    Trader,
    Advisor,
    Finfluencer,
    Organizer,
    Admin,
    SuperAdmin,
    Other(String),
}

impl Default for AppRole {
    fn default() -> Self {
        Self::User
    }
}

impl AppRole {
    /// Admin and super admin bypass every entitlement check
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Trader => "trader",
            Self::Advisor => "advisor",
            Self::Finfluencer => "finfluencer",
            Self::Organizer => "organizer",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
            Self::Other(role) => role,
        }
    }
}

impl From<String> for AppRole {
    fn from(role: String) -> Self {
        match role.trim().to_lowercase().as_str() {
            "user" => Self::User,
            "trader" => Self::Trader,
            "advisor" => Self::Advisor,
            "finfluencer" => Self::Finfluencer,
            "organizer" => Self::Organizer,
            "admin" => Self::Admin,
            "super_admin" => Self::SuperAdmin,
            _ => Self::Other(role),
        }
    }
}

impl From<&str> for AppRole {
    fn from(role: &str) -> Self {
        Self::from(role.to_string())
    }
}

impl From<AppRole> for String {
    fn from(role: AppRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for AppRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a subscription record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    Active,
    Pending,
    Expired,
    Cancelled,
    Other(String),
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for SubscriptionStatus {
    fn from(status: String) -> Self {
        match status.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "pending" => Self::Pending,
            "expired" => Self::Expired,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(status),
        }
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(status: &str) -> Self {
        Self::from(status.to_string())
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketing tier used for "upgrade to X" messaging
/// Ordering: Basic < Premium < Vip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Premium,
    Vip,
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::Premium
    }
}

impl PlanTier {
    /// Human-readable label for upgrade prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Premium => "Premium",
            Self::Vip => "VIP",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Premium => write!(f, "premium"),
            Self::Vip => write!(f, "vip"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = InvestHubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            "vip" => Ok(Self::Vip),
            _ => Err(InvestHubError::InvalidTier(s.to_string())),
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// An authenticated platform user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub app_role: AppRole,
}

impl User {
    pub fn new(id: impl Into<UserId>, app_role: AppRole) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
            app_role,
        }
    }
}

/// Catalog entry describing a purchasable plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    /// Feature keys granted directly by this plan
    #[serde(default)]
    pub features: Vec<String>,
    /// Parent plan whose features this plan also grants
    #[serde(default)]
    pub inherits_from_plan_id: Option<PlanId>,
    #[serde(default)]
    pub price_monthly: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: Option<i32>,
}

fn default_true() -> bool {
    true
}

impl SubscriptionPlan {
    pub fn new(id: impl Into<PlanId>, name: impl Into<String>, features: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            features: features.iter().map(|f| f.to_string()).collect(),
            inherits_from_plan_id: None,
            price_monthly: None,
            is_active: true,
            display_order: None,
        }
    }

    /// Builder-style parent assignment
    pub fn inheriting(mut self, parent: impl Into<PlanId>) -> Self {
        self.inherits_from_plan_id = Some(parent.into());
        self
    }
}

/// A user's subscription record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    /// Free-text plan label, matched against `SubscriptionPlan::name`
    pub plan_type: String,
    /// Stable foreign key to the plan, when the record carries one
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    pub status: SubscriptionStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default, alias = "created_date", with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl Subscription {
    pub fn active(user_id: impl Into<UserId>, plan_type: impl Into<String>) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id: user_id.into(),
            plan_type: plan_type.into(),
            plan_id: None,
            status: SubscriptionStatus::Active,
            end_date: None,
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_role_parsing() {
        assert_eq!(AppRole::from("admin"), AppRole::Admin);
        assert_eq!(AppRole::from("Super_Admin"), AppRole::SuperAdmin);
        assert_eq!(AppRole::from("finfluencer"), AppRole::Finfluencer);
        assert_eq!(
            AppRole::from("moderator"),
            AppRole::Other("moderator".to_string())
        );
    }

    #[test]
    fn test_only_admin_roles_bypass() {
        assert!(AppRole::Admin.is_admin());
        assert!(AppRole::SuperAdmin.is_admin());
        assert!(!AppRole::Advisor.is_admin());
        assert!(!AppRole::Other("root".to_string()).is_admin());
    }

    #[test]
    fn test_subscription_status_accepts_both_spellings() {
        assert_eq!(
            SubscriptionStatus::from("canceled"),
            SubscriptionStatus::Cancelled
        );
        assert_eq!(
            SubscriptionStatus::from("cancelled"),
            SubscriptionStatus::Cancelled
        );
        assert!(SubscriptionStatus::from("ACTIVE").is_active());
    }

    #[test]
    fn test_plan_tier_ordering() {
        assert!(PlanTier::Basic < PlanTier::Premium);
        assert!(PlanTier::Premium < PlanTier::Vip);
        assert_eq!("VIP".parse::<PlanTier>().unwrap(), PlanTier::Vip);
        assert!("gold".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_subscription_deserializes_entity_api_shape() {
        let json = r#"{
            "id": "sub_1",
            "user_id": "u_1",
            "plan_type": "Premium",
            "status": "active",
            "end_date": null,
            "created_date": "2024-03-01T10:00:00Z"
        }"#;

        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.user_id, UserId::from("u_1"));
        assert!(sub.status.is_active());
        assert!(sub.created_at.is_some());
        assert!(sub.plan_id.is_none());
    }

    #[test]
    fn test_plan_defaults() {
        let json = r#"{ "id": "p_free", "name": "Free" }"#;
        let plan: SubscriptionPlan = serde_json::from_str(json).unwrap();
        assert!(plan.features.is_empty());
        assert!(plan.is_active);
        assert!(plan.inherits_from_plan_id.is_none());
    }
}
