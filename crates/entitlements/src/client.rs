//! Entity API client
//!
//! Reads subscriptions, the plan catalog, and the current user from the
//! platform's entity REST API.

use std::time::Duration;

use async_trait::async_trait;
use investhub_shared::types::{Subscription, SubscriptionPlan, User, UserId};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{EntitlementError, EntitlementResult, FetchError};
use crate::source::{IdentitySource, PlanSource, SubscriptionSource};

const SUBSCRIPTION_ENTITY: &str = "Subscription";
const PLAN_ENTITY: &str = "SubscriptionPlan";

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// List endpoints answer either with a bare array or an envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Envelope { data: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) | ListResponse::Envelope { data: items } => items,
        }
    }
}

/// Client for the entity REST API
#[derive(Clone)]
pub struct EntityApiClient {
    client: Client,
    base_url: String,
    service_token: Option<String>,
}

impl EntityApiClient {
    /// Create a client for `base_url` (e.g. `https://api.example.com/v1`)
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        service_token: Option<String>,
    ) -> EntitlementResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(EntitlementError::Config("Entity API URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EntitlementError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            service_token: service_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn entity_url(&self, entity: &str) -> String {
        format!("{}/entities/{}", self.base_url, entity)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.service_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, FetchError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let body: ListResponse<T> = response.json().await?;
        Ok(body.into_vec())
    }
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> FetchError {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    FetchError::Status {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl SubscriptionSource for EntityApiClient {
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>, FetchError> {
        let request = self
            .client
            .get(self.entity_url(SUBSCRIPTION_ENTITY))
            .query(&[
                ("user_id", user_id.as_str()),
                ("status", "active"),
                ("sort", "-created_date"),
            ]);

        let subscriptions: Vec<Subscription> = self.list(self.authorized(request)).await?;
        tracing::debug!(user_id = %user_id, count = subscriptions.len(), "Fetched subscriptions");
        Ok(subscriptions)
    }
}

#[async_trait]
impl PlanSource for EntityApiClient {
    async fn plan_catalog(&self) -> Result<Vec<SubscriptionPlan>, FetchError> {
        let request = self.client.get(self.entity_url(PLAN_ENTITY));

        let plans: Vec<SubscriptionPlan> = self.list(self.authorized(request)).await?;
        tracing::debug!(count = plans.len(), "Fetched plan catalog");
        Ok(plans)
    }
}

#[async_trait]
impl IdentitySource for EntityApiClient {
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, FetchError> {
        let response = self
            .client
            .get(format!("{}/auth/me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        Ok(Some(response.json().await?))
    }
}
