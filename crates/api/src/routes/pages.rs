//! Presentation views rendered as JSON

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Redirect,
    Extension, Json,
};
use plansync_billing::{DashboardSubscription, PricingPlan};
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub use super::checkout::verify_checkout as checkout_success;

/// Landing view
pub async fn home(State(state): State<AppState>) -> Json<Value> {
    let app_url = &state.config.app_url;
    Json(json!({
        "name": "Plansync",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "sign_in": format!("{}/auth/sign-in", app_url),
            "sign_up": format!("{}/auth/sign-up", app_url),
            "pricing": format!("{}/pricing", app_url),
        }
    }))
}

/// Append `redirect_url` to a hosted sign-in/up page
fn hand_off_url(target: &str, params: &HashMap<String, String>) -> ApiResult<String> {
    let mut url = Url::parse(target).map_err(|e| {
        tracing::error!(target = %target, error = %e, "Invalid identity provider URL");
        ApiError::Config("identity provider URL is invalid".to_string())
    })?;

    if let Some(redirect) = params.get("redirect_url").filter(|r| !r.is_empty()) {
        url.query_pairs_mut().append_pair("redirect_url", redirect);
    }
    Ok(url.into())
}

pub async fn sign_in(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Redirect> {
    Ok(Redirect::temporary(&hand_off_url(&state.config.sign_in_url, &params)?))
}

pub async fn sign_up(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Redirect> {
    Ok(Redirect::temporary(&hand_off_url(&state.config.sign_up_url, &params)?))
}

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub plans: Vec<PricingPlan>,
}

/// Active plans, cheapest first
pub async fn pricing(State(state): State<AppState>) -> ApiResult<Json<PricingResponse>> {
    let plans = state.billing.catalog.pricing_plans().await?;
    Ok(Json(PricingResponse { plans }))
}

#[derive(Debug, Serialize)]
pub struct DashboardUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: DashboardUser,
    pub subscription: Option<DashboardSubscription>,
}

/// Caller's active subscription with its price and product
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<DashboardResponse>> {
    let subscription = state.billing.catalog.dashboard(&auth_user.user_id).await?;

    Ok(Json(DashboardResponse {
        user: DashboardUser {
            id: auth_user.user_id,
            email: auth_user.email,
            name: auth_user.name,
        },
        subscription,
    }))
}
