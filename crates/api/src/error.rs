//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use investhub_entitlements::FallbackMode;
use investhub_shared::{error::InvestHubError, types::PlanTier};
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Entitlement errors
    #[error("{message}")]
    FeatureLocked {
        feature_key: String,
        required_tier: PlanTier,
        user_plan_label: String,
        mode: FallbackMode,
        message: String,
    },
    #[error("Entitlements are still loading")]
    EntitlementsLoading,

    // Upstream errors
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "code": "BAD_REQUEST", "message": msg } }),
            ),
            ApiError::FeatureLocked {
                feature_key,
                required_tier,
                user_plan_label,
                mode,
                message,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                json!({
                    "error": {
                        "code": "FEATURE_LOCKED",
                        "message": message,
                        "feature_key": feature_key,
                        "required_tier": required_tier,
                        "user_plan_label": user_plan_label,
                        "mode": mode,
                    }
                }),
            ),
            ApiError::EntitlementsLoading => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": { "code": "ENTITLEMENTS_LOADING", "message": self.to_string() } }),
            ),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": { "code": "SERVICE_UNAVAILABLE", "message": self.to_string() } }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<InvestHubError> for ApiError {
    fn from(err: InvestHubError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
