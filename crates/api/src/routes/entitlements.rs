//! Entitlement endpoints

use axum::{extract::State, http::StatusCode, Extension, Json};
use investhub_entitlements::{CacheStats, Entitlements, ResolveOutcome};
use serde::Serialize;

use crate::{auth::Viewer, state::AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Cached,
    Busy,
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct EntitlementsResponse {
    pub status: ResolutionStatus,
    /// True when there is nothing to decide on yet; callers should retry
    pub loading: bool,
    pub entitlements: Option<Entitlements>,
    /// Session cache state, absent for guests and role-bypass users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

impl EntitlementsResponse {
    fn new(outcome: ResolveOutcome, cache: Option<CacheStats>) -> Self {
        let loading = outcome.is_loading();
        let (status, entitlements) = match outcome {
            ResolveOutcome::Resolved(ent) => (ResolutionStatus::Resolved, Some(ent)),
            ResolveOutcome::Cached(ent) => (ResolutionStatus::Cached, Some(ent)),
            ResolveOutcome::Busy(ent) => (ResolutionStatus::Busy, ent),
            ResolveOutcome::Cancelled => (ResolutionStatus::Cancelled, None),
        };
        Self {
            status,
            loading,
            entitlements: entitlements.map(|ent| ent.as_ref().clone()),
            cache,
        }
    }
}

fn session_stats(state: &AppState, viewer: &Viewer) -> Option<CacheStats> {
    viewer
        .user()
        .and_then(|user| state.sessions.get(&user.id))
        .map(|resolver| resolver.cache().stats())
}

/// Resolve the viewer's effective entitlements
pub async fn get_entitlements(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Json<EntitlementsResponse> {
    let cancel = state.request_token();
    let outcome = state.sessions.resolve(viewer.user(), &cancel).await;
    Json(EntitlementsResponse::new(outcome, session_stats(&state, &viewer)))
}

/// Drop the viewer's cached entitlements and resolve again
///
/// Clients call this after checkout, cancellation, or any other change to
/// the user's subscription.
pub async fn invalidate(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Json<EntitlementsResponse> {
    let cancel = state.request_token();
    let outcome = state.sessions.invalidate(viewer.user(), &cancel).await;
    Json(EntitlementsResponse::new(outcome, session_stats(&state, &viewer)))
}

/// End the viewer's entitlement session (logout)
pub async fn end_session(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> StatusCode {
    if let Some(user) = viewer.user() {
        if state.sessions.remove(&user.id) {
            tracing::debug!(user_id = %user.id, "Entitlement session ended");
        }
    }
    StatusCode::NO_CONTENT
}
