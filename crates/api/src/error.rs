//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use plansync_billing::BillingError;
use plansync_shared::StoreError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Webhook Error: {0}")]
    InvalidSignature(String),

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Internal errors
    #[error("{0}")]
    Upstream(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Webhook handler failed")]
    WebhookFailed,
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", self.to_string()),

            // Resources
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),

            // Internal
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR", msg.clone()),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", "Server misconfigured".to_string()),
            ApiError::WebhookFailed => (StatusCode::INTERNAL_SERVER_ERROR, "WEBHOOK_FAILED", self.to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {:?}", err);
        ApiError::Database(err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidInput(msg) => ApiError::Validation(msg),
            BillingError::WebhookSignatureInvalid => {
                ApiError::InvalidSignature("signature verification failed".to_string())
            }
            BillingError::NotFound(msg) => ApiError::NotFound(msg),
            BillingError::Forbidden(msg) => ApiError::Forbidden(msg),
            BillingError::Store(err) => err.into(),
            BillingError::StripeApi(msg) => {
                tracing::error!(error = %msg, "Stripe request failed");
                ApiError::Upstream(msg)
            }
            BillingError::Config(msg) => ApiError::Config(msg),
            err @ (BillingError::InvalidPayload(_) | BillingError::UnresolvedCustomer(_)) => {
                tracing::error!(error = %err, "Billing event could not be applied");
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
