//! Feature access endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use investhub_entitlements::{
    tier_features, tier_table, FallbackMode, FeatureAccessResult, FeatureGate, GateDecision,
    TierFeatures, WILDCARD_FEATURE,
};
use investhub_shared::types::PlanTier;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Viewer,
    error::{ApiError, ApiResult},
    gate::enforce,
    state::AppState,
};

const MAX_FEATURE_KEY_LEN: usize = 64;

/// Feature keys are lowercase snake_case identifiers
fn validate_feature_key(feature_key: &str) -> ApiResult<()> {
    let valid = !feature_key.is_empty()
        && feature_key.len() <= MAX_FEATURE_KEY_LEN
        && feature_key != WILDCARD_FEATURE
        && feature_key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid feature key: {}", feature_key)))
    }
}

/// Access check for one feature
pub async fn check_feature_access(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(feature_key): Path<String>,
) -> ApiResult<Json<FeatureAccessResult>> {
    validate_feature_key(&feature_key)?;

    let cancel = state.request_token();
    let outcome = state.sessions.resolve(viewer.user(), &cancel).await;
    let (access, _) = FeatureGate::new(&feature_key).evaluate(
        viewer.user(),
        outcome.entitlements().map(|ent| ent.as_ref()),
        &state.policy,
    );

    Ok(Json(access))
}

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    #[serde(default)]
    pub mode: FallbackMode,
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub access: FeatureAccessResult,
    pub gate: GateDecision,
}

/// Presentation decision for gated content
pub async fn gate_decision(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(feature_key): Path<String>,
    Query(query): Query<GateQuery>,
) -> ApiResult<Json<GateResponse>> {
    validate_feature_key(&feature_key)?;

    let cancel = state.request_token();
    let outcome = state.sessions.resolve(viewer.user(), &cancel).await;
    let (access, gate) = FeatureGate::new(&feature_key).with_mode(query.mode).evaluate(
        viewer.user(),
        outcome.entitlements().map(|ent| ent.as_ref()),
        &state.policy,
    );

    Ok(Json(GateResponse { access, gate }))
}

/// Enforcement probe for proxies: 204 on grant, 402 locked, 503 loading
pub async fn enforce_feature(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(feature_key): Path<String>,
    Query(query): Query<GateQuery>,
) -> ApiResult<StatusCode> {
    validate_feature_key(&feature_key)?;

    let gate = FeatureGate::new(&feature_key).with_mode(query.mode);
    enforce(&state, &viewer, &gate).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Minimum-tier table for known feature keys
pub async fn tiers() -> Json<Vec<TierFeatures>> {
    Json(tier_table())
}

/// Features introduced at one tier (`basic`, `premium`, `vip`)
pub async fn tier(Path(tier): Path<String>) -> ApiResult<Json<TierFeatures>> {
    let tier: PlanTier = tier.parse()?;
    Ok(Json(tier_features(tier)))
}
