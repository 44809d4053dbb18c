//! Request authentication
//!
//! Every request is resolved to a [`Viewer`]: the authenticated user, or a
//! guest when no usable credential is present.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use investhub_shared::types::User;

use crate::{error::ApiError, state::AppState};

/// Who is making the request
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn guest() -> Self {
        Self(None)
    }

    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Attach a [`Viewer`] to the request
///
/// Missing, expired, or unrecognised credentials make the request a guest
/// request. An identity provider outage fails the request with 503 rather
/// than silently downgrading a paying user to guest.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = bearer_token(req.headers()).map(str::to_owned);

    let viewer = match token {
        None => Viewer::guest(),
        Some(token) => match state.identity.current_user(&token).await {
            Ok(user) => Viewer(user),
            Err(e) => {
                tracing::warn!(error = %e, "Identity lookup failed");
                return ApiError::ServiceUnavailable.into_response();
            }
        },
    };

    if let Some(user) = viewer.user() {
        tracing::debug!(user_id = %user.id, role = %user.app_role, "Authenticated request");
    }

    req.extensions_mut().insert(viewer);
    next.run(req).await
}
