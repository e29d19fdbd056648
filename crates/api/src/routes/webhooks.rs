//! Signed webhook receivers for the payment processor and the identity provider

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use plansync_billing::BillingError;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};
use crate::identity::svix::{SVIX_ID_HEADER, SVIX_SIGNATURE_HEADER, SVIX_TIMESTAMP_HEADER};
use crate::identity::SvixHeaders;
use crate::state::AppState;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handle Stripe webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<Value>> {
    let signature = header_str(&headers, STRIPE_SIGNATURE_HEADER);

    let event = match state.billing.webhooks.verify_event(&body, signature) {
        Ok(event) => event,
        Err(BillingError::WebhookSignatureInvalid) => {
            return Err(ApiError::InvalidSignature(
                "signature verification failed".to_string(),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "Stripe webhook payload rejected");
            return Err(ApiError::WebhookFailed);
        }
    };

    let event_id = event.id.clone();
    let event_type = event.event_type.clone();

    if let Err(e) = state.billing.webhooks.handle_event(event).await {
        tracing::error!(
            event_id = %event_id,
            event_type = %event_type,
            error = %e,
            "Stripe webhook handler failed"
        );
        return Err(ApiError::WebhookFailed);
    }

    Ok(Json(json!({ "received": true })))
}

/// Handle identity-provider (Svix-signed) webhook
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, &'static str)> {
    let svix = match (
        header_str(&headers, SVIX_ID_HEADER),
        header_str(&headers, SVIX_TIMESTAMP_HEADER),
        header_str(&headers, SVIX_SIGNATURE_HEADER),
    ) {
        (Some(id), Some(timestamp), Some(signature)) => Some(SvixHeaders {
            id,
            timestamp,
            signature,
        }),
        _ => None,
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let event = state.identity.verify_event(svix, &body, now)?;
    let event_type = event.event_type().to_string();

    state.identity.apply(event).await.map_err(|e| {
        tracing::error!(event_type = %event_type, error = %e, "Identity webhook handler failed");
        ApiError::from(e)
    })?;

    Ok((StatusCode::OK, "Webhook processed"))
}
