//! Postgres-backed subscription and plan lookup
//!
//! Ids are read through `::text` so the store works whether the tables key
//! on UUID or TEXT columns.

use async_trait::async_trait;
use investhub_shared::types::{PlanId, Subscription, SubscriptionId, SubscriptionPlan, UserId};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::FetchError;
use crate::source::{PlanSource, SubscriptionSource};

/// Entitlement data store over the `subscriptions` and `subscription_plans` tables
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionSource for PgEntitlementStore {
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>, FetchError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT
                id::text AS id,
                user_id::text AS user_id,
                plan_type,
                plan_id::text AS plan_id,
                status,
                end_date,
                created_at
            FROM subscriptions
            WHERE user_id::text = $1 AND status = 'active'
            ORDER BY created_at DESC NULLS LAST
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }
}

#[async_trait]
impl PlanSource for PgEntitlementStore {
    async fn plan_catalog(&self) -> Result<Vec<SubscriptionPlan>, FetchError> {
        let rows: Vec<PlanRow> = sqlx::query_as(
            r#"
            SELECT
                id::text AS id,
                name,
                COALESCE(features, ARRAY[]::text[]) AS features,
                inherits_from_plan_id::text AS inherits_from_plan_id,
                price_monthly::float8 AS price_monthly,
                COALESCE(is_active, true) AS is_active,
                display_order
            FROM subscription_plans
            ORDER BY display_order NULLS LAST, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubscriptionPlan::from).collect())
    }
}

/// Raw subscription row
#[derive(Debug)]
struct SubscriptionRow {
    id: String,
    user_id: String,
    plan_type: String,
    plan_id: Option<String>,
    status: String,
    end_date: Option<OffsetDateTime>,
    created_at: Option<OffsetDateTime>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SubscriptionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_type: row.try_get("plan_type")?,
            plan_id: row.try_get("plan_id")?,
            status: row.try_get("status")?,
            end_date: row.try_get("end_date")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            id: SubscriptionId(row.id),
            user_id: UserId(row.user_id),
            plan_type: row.plan_type,
            plan_id: row.plan_id.map(PlanId),
            status: row.status.into(),
            end_date: row.end_date,
            created_at: row.created_at,
        }
    }
}

/// Raw plan row
#[derive(Debug)]
struct PlanRow {
    id: String,
    name: String,
    features: Vec<String>,
    inherits_from_plan_id: Option<String>,
    price_monthly: Option<f64>,
    is_active: bool,
    display_order: Option<i32>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PlanRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            features: row.try_get("features")?,
            inherits_from_plan_id: row.try_get("inherits_from_plan_id")?,
            price_monthly: row.try_get("price_monthly")?,
            is_active: row.try_get("is_active")?,
            display_order: row.try_get("display_order")?,
        })
    }
}

impl From<PlanRow> for SubscriptionPlan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: PlanId(row.id),
            name: row.name,
            features: row.features,
            inherits_from_plan_id: row.inherits_from_plan_id.map(PlanId),
            price_monthly: row.price_monthly,
            is_active: row.is_active,
            display_order: row.display_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use investhub_shared::types::SubscriptionStatus;

    #[test]
    fn test_subscription_row_conversion() {
        let row = SubscriptionRow {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            plan_type: "Premium".to_string(),
            plan_id: Some("p_premium".to_string()),
            status: "active".to_string(),
            end_date: None,
            created_at: Some(OffsetDateTime::UNIX_EPOCH),
        };

        let sub = Subscription::from(row);
        assert_eq!(sub.user_id.as_str(), "u1");
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan_id.as_ref().map(|p| p.as_str()), Some("p_premium"));
    }

    #[test]
    fn test_plan_row_conversion() {
        let row = PlanRow {
            id: "p_premium".to_string(),
            name: "Premium".to_string(),
            features: vec!["advisor_picks".to_string()],
            inherits_from_plan_id: Some("p_free".to_string()),
            price_monthly: Some(19.0),
            is_active: true,
            display_order: Some(2),
        };

        let plan = SubscriptionPlan::from(row);
        assert_eq!(plan.features, vec!["advisor_picks".to_string()]);
        assert_eq!(plan.inherits_from_plan_id, Some(PlanId::from("p_free")));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_plan_catalog_query() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = investhub_shared::db::create_pool(&url, 2)
            .await
            .expect("Failed to create pool");
        let store = PgEntitlementStore::new(pool);

        store.plan_catalog().await.expect("Failed to load plan catalog");
    }
}
