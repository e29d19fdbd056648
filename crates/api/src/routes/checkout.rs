//! Checkout endpoints

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use plansync_shared::Subscription;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub price_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub subscription: Subscription,
}

/// Open a subscription checkout session for the caller
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let url = state
        .billing
        .checkout
        .create_checkout(&auth_user.billing_user(), &req.price_id)
        .await?;

    Ok(Json(CheckoutResponse { url }))
}

/// Confirm a completed checkout belongs to the caller and return its subscription
pub async fn verify_checkout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<VerifyResponse>> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("session_id is required".to_string()))?;

    let subscription = state
        .billing
        .checkout
        .verify_checkout(&session_id, &auth_user.user_id)
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        subscription,
    }))
}
