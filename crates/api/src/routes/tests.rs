//! Router tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use investhub_entitlements::{FallbackMode, InMemorySource, ResolverConfig};
use investhub_shared::types::{AppRole, Subscription, SubscriptionPlan, User};
use serde_json::Value;
use tower::ServiceExt;

use super::create_router;
use crate::{
    auth::{optional_auth, JwtManager},
    config::Config,
    gate::{require_feature, FeatureGuard},
    sessions::SessionRegistry,
    state::AppState,
};

const SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";

struct Harness {
    source: Arc<InMemorySource>,
    jwt: JwtManager,
    state: AppState,
}

impl Harness {
    fn new(guest_basic_access: bool) -> Self {
        let source = Arc::new(InMemorySource::with_plans(vec![
            SubscriptionPlan::new("p_free", "Free", &["chat_rooms", "polls"]),
            SubscriptionPlan::new("p_premium", "Premium", &["advisor_picks", "pledge_pool"])
                .inheriting("p_free"),
            SubscriptionPlan::new("p_vip", "VIP", &["vip_chat_rooms"]).inheriting("p_premium"),
        ]));

        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            entity_api_url: None,
            entity_api_token: None,
            database_url: None,
            database_max_connections: 1,
            jwt_secret: Some(SECRET.to_string()),
            jwt_expiry_hours: 1,
            resolver: ResolverConfig::default(),
            guest_basic_access,
            session_idle: Duration::from_secs(60),
            session_sweep_interval: Duration::from_secs(60),
            log_json: false,
        };

        let jwt = JwtManager::new(SECRET, 1);
        let sessions = Arc::new(SessionRegistry::new(
            source.clone(),
            source.clone(),
            config.resolver.clone(),
            config.session_idle,
        ));
        let state = AppState::new(config, Arc::new(jwt.clone()), sessions);

        Self { source, jwt, state }
    }

    fn token(&self, user_id: &str, role: AppRole) -> String {
        self.jwt.generate_token(&User::new(user_id, role)).unwrap()
    }

    fn app(&self) -> Router {
        create_router(self.state.clone())
    }
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(false);
    let (status, body) = send(harness.app(), get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(harness.app(), get_request("/health/live", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_guest_entitlements_are_empty() {
    let harness = Harness::new(false);
    let (status, body) = send(harness.app(), get_request("/api/v1/entitlements", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["loading"], false);
    assert_eq!(body["entitlements"]["features"], serde_json::json!([]));
    assert_eq!(harness.source.subscription_calls(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_guest() {
    let harness = Harness::new(false);
    let (status, body) = send(
        harness.app(),
        get_request("/api/v1/features/chat_rooms/access", Some("not-a-jwt")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_access"], false);
    assert_eq!(body["user_plan_label"], "Guest");
}

#[tokio::test]
async fn test_subscriber_entitlements_are_cached() {
    let harness = Harness::new(false);
    harness.source.add_subscription(Subscription::active("u1", "premium"));
    let token = harness.token("u1", AppRole::Trader);

    let (_, first) = send(harness.app(), get_request("/api/v1/entitlements", Some(&token))).await;
    let (_, second) = send(harness.app(), get_request("/api/v1/entitlements", Some(&token))).await;

    assert_eq!(first["status"], "resolved");
    assert_eq!(second["status"], "cached");
    assert_eq!(second["cache"]["entitlement_cached"], true);
    let features = second["entitlements"]["features"].as_array().unwrap();
    assert!(features.contains(&Value::from("advisor_picks")));
    assert!(features.contains(&Value::from("chat_rooms")));
    assert_eq!(harness.source.subscription_calls(), 1);
}

#[tokio::test]
async fn test_feature_access_for_subscriber() {
    let harness = Harness::new(false);
    harness.source.add_subscription(Subscription::active("u1", "premium"));
    let token = harness.token("u1", AppRole::User);

    let (_, granted) = send(
        harness.app(),
        get_request("/api/v1/features/pledge_pool/access", Some(&token)),
    )
    .await;
    assert_eq!(granted["has_access"], true);

    let (_, denied) = send(
        harness.app(),
        get_request("/api/v1/features/vip_chat_rooms/access", Some(&token)),
    )
    .await;
    assert_eq!(denied["has_access"], false);
    assert_eq!(denied["required_plan_tier"], "vip");
    assert_eq!(denied["user_plan_label"], "Premium");
}

#[tokio::test]
async fn test_admin_bypasses_gates() {
    let harness = Harness::new(false);
    let token = harness.token("a1", AppRole::Admin);

    let (status, _) = send(
        harness.app(),
        get_request("/api/v1/features/one_on_one_advisor/enforce", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(harness.source.subscription_calls(), 0);
}

#[tokio::test]
async fn test_enforce_locked_feature_is_payment_required() {
    let harness = Harness::new(false);
    let token = harness.token("u1", AppRole::User);

    let (status, body) = send(
        harness.app(),
        get_request("/api/v1/features/advisor_picks/enforce?mode=blur", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "FEATURE_LOCKED");
    assert_eq!(body["error"]["required_tier"], "premium");
    assert_eq!(body["error"]["user_plan_label"], "Free");
    assert_eq!(body["error"]["mode"], "blur");
}

#[tokio::test]
async fn test_gate_decision() {
    let harness = Harness::new(false);
    let token = harness.token("u1", AppRole::User);

    let (_, render) = send(
        harness.app(),
        get_request("/api/v1/features/chat_rooms/gate", Some(&token)),
    )
    .await;
    assert_eq!(render["gate"]["decision"], "render");

    let (_, fallback) = send(
        harness.app(),
        get_request("/api/v1/features/pledge_pool/gate?mode=inline", Some(&token)),
    )
    .await;
    assert_eq!(fallback["gate"]["decision"], "fallback");
    assert_eq!(fallback["gate"]["mode"], "inline");
    assert_eq!(fallback["gate"]["message"], "Upgrade to Premium to unlock this feature");
}

#[tokio::test]
async fn test_guest_basic_access_policy() {
    let harness = Harness::new(true);

    let (_, basic) = send(harness.app(), get_request("/api/v1/features/polls/access", None)).await;
    assert_eq!(basic["has_access"], true);

    let (_, premium) = send(
        harness.app(),
        get_request("/api/v1/features/advisor_picks/access", None),
    )
    .await;
    assert_eq!(premium["has_access"], false);
}

#[tokio::test]
async fn test_invalid_feature_key_rejected() {
    let harness = Harness::new(false);
    let (status, body) = send(
        harness.app(),
        get_request("/api/v1/features/Not-A-Key/access", None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalidate_picks_up_new_subscription() {
    let harness = Harness::new(false);
    let token = harness.token("u1", AppRole::User);

    let (_, before) = send(
        harness.app(),
        get_request("/api/v1/features/vip_chat_rooms/access", Some(&token)),
    )
    .await;
    assert_eq!(before["has_access"], false);

    harness.source.add_subscription(Subscription::active("u1", "VIP"));
    let (status, after) = send(
        harness.app(),
        request("POST", "/api/v1/entitlements/invalidate", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["status"], "resolved");
    assert_eq!(after["entitlements"]["plan"]["name"], "VIP");

    let (_, now) = send(
        harness.app(),
        get_request("/api/v1/features/vip_chat_rooms/access", Some(&token)),
    )
    .await;
    assert_eq!(now["has_access"], true);
}

#[tokio::test]
async fn test_end_session() {
    let harness = Harness::new(false);
    let token = harness.token("u1", AppRole::User);

    send(harness.app(), get_request("/api/v1/entitlements", Some(&token))).await;
    assert_eq!(harness.state.sessions.len(), 1);

    let (status, _) = send(
        harness.app(),
        request("DELETE", "/api/v1/entitlements/session", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(harness.state.sessions.is_empty());
}

#[tokio::test]
async fn test_tier_table() {
    let harness = Harness::new(false);
    let (status, body) = send(harness.app(), get_request("/api/v1/features/tiers", None)).await;

    assert_eq!(status, StatusCode::OK);
    let tiers = body.as_array().unwrap();
    assert_eq!(tiers.len(), 3);
    assert_eq!(tiers[0]["tier"], "basic");
    assert_eq!(tiers[2]["label"], "VIP");
}

#[tokio::test]
async fn test_single_tier_lookup() {
    let harness = Harness::new(false);

    let (status, body) = send(harness.app(), get_request("/api/v1/features/tiers/Premium", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "premium");
    assert!(body["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| *f == "advisor_picks"));

    let (status, body) = send(harness.app(), get_request("/api/v1/features/tiers/gold", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "Invalid plan tier: gold");
}

async fn premium_content() -> &'static str {
    "picks"
}

fn gated_app(harness: &Harness) -> Router {
    Router::new()
        .route(
            "/picks",
            get(premium_content).route_layer(middleware::from_fn_with_state(
                FeatureGuard::new(&harness.state, "advisor_picks", FallbackMode::Full),
                require_feature,
            )),
        )
        .layer(middleware::from_fn_with_state(harness.state.clone(), optional_auth))
        .with_state(harness.state.clone())
}

#[tokio::test]
async fn test_require_feature_middleware() {
    let harness = Harness::new(false);
    harness.source.add_subscription(Subscription::active("paid", "premium"));

    let paid = harness.token("paid", AppRole::User);
    let response = gated_app(&harness)
        .oneshot(get_request("/picks", Some(&paid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let free = harness.token("free", AppRole::User);
    let response = gated_app(&harness)
        .oneshot(get_request("/picks", Some(&free)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let response = gated_app(&harness)
        .oneshot(get_request("/picks", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_require_feature_while_loading() {
    let harness = Harness::new(false);
    harness.source.set_latency(Duration::from_millis(200));
    let token = harness.token("u1", AppRole::User);

    // Hold the session's resolution slot with a slow request
    let slow = {
        let app = harness.app();
        let req = get_request("/api/v1/entitlements", Some(&token));
        tokio::spawn(async move { app.oneshot(req).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let response = gated_app(&harness)
        .oneshot(get_request("/picks", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    slow.await.unwrap().unwrap();
}
