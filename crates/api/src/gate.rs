//! Feature gating for HTTP routes
//!
//! `require_feature` is the server-side form of a feature gate: the wrapped
//! route only runs on a confirmed grant. Denials answer 402 with the upgrade
//! details, and an unresolved entitlement answers 503.
//!
//! This crate's own routes take the feature key from the path and call
//! [`enforce`] directly. [`require_feature`] is exported for routers that
//! serve gated content and mount the entitlement routes alongside it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use investhub_entitlements::{FallbackMode, FeatureAccessResult, FeatureGate, GateDecision};

use crate::auth::Viewer;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Middleware state binding a gate to the application
#[derive(Clone)]
pub struct FeatureGuard {
    state: AppState,
    gate: FeatureGate,
}

impl FeatureGuard {
    pub fn new(state: &AppState, feature_key: &str, mode: FallbackMode) -> Self {
        Self {
            state: state.clone(),
            gate: FeatureGate::new(feature_key).with_mode(mode),
        }
    }
}

/// Resolve the viewer's entitlements and apply `gate`
pub async fn enforce(
    state: &AppState,
    viewer: &Viewer,
    gate: &FeatureGate,
) -> ApiResult<FeatureAccessResult> {
    let cancel = state.request_token();
    let outcome = state.sessions.resolve(viewer.user(), &cancel).await;
    let (access, decision) = gate.evaluate(
        viewer.user(),
        outcome.entitlements().map(|ent| ent.as_ref()),
        &state.policy,
    );

    match decision {
        GateDecision::Render => Ok(access),
        GateDecision::Loading => Err(ApiError::EntitlementsLoading),
        GateDecision::Fallback {
            mode,
            required_tier,
            user_plan_label,
            message,
        } => {
            tracing::debug!(
                feature_key = %gate.feature_key(),
                required_tier = %required_tier,
                plan = %user_plan_label,
                "Feature locked"
            );
            Err(ApiError::FeatureLocked {
                feature_key: gate.feature_key().to_string(),
                required_tier,
                user_plan_label,
                mode,
                message,
            })
        }
    }
}

/// Route layer admitting only viewers entitled to the guard's feature
///
/// Usage:
/// ```ignore
/// .route_layer(middleware::from_fn_with_state(
///     FeatureGuard::new(&state, "advisor_picks", FallbackMode::Full),
///     require_feature,
/// ))
/// ```
pub async fn require_feature(State(guard): State<FeatureGuard>, req: Request, next: Next) -> Response {
    let viewer = req.extensions().get::<Viewer>().cloned().unwrap_or_default();

    match enforce(&guard.state, &viewer, &guard.gate).await {
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
