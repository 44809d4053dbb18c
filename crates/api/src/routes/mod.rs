//! API routes

pub mod entitlements;
pub mod features;
pub mod health;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::optional_auth, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    // Every API route sees a Viewer; guests are allowed through
    let api_v1_routes = Router::new()
        .route("/entitlements", get(entitlements::get_entitlements))
        .route("/entitlements/invalidate", post(entitlements::invalidate))
        .route("/entitlements/session", delete(entitlements::end_session))
        .route("/features/tiers", get(features::tiers))
        .route("/features/tiers/:tier", get(features::tier))
        .route("/features/:feature_key/access", get(features::check_feature_access))
        .route("/features/:feature_key/gate", get(features::gate_decision))
        .route("/features/:feature_key/enforce", get(features::enforce_feature))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests;
