//! API routes

pub mod checkout;
pub mod health;
pub mod pages;
pub mod webhooks;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{auth::require_session, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public routes (webhooks carry their own signatures)
    let public_routes = Router::new()
        .route("/", get(pages::home))
        .route("/auth/sign-in", get(pages::sign_in))
        .route("/auth/sign-up", get(pages::sign_up))
        .route("/api/webhook/stripe", post(webhooks::stripe_webhook))
        .route("/api/webhook/clerk", post(webhooks::clerk_webhook));

    // Session-protected routes
    let protected_routes = Router::new()
        .route("/api/checkout", post(checkout::create_checkout))
        .route("/api/checkout/verify", get(checkout::verify_checkout))
        .route("/pricing", get(pages::pricing))
        .route("/dashboard", get(pages::dashboard))
        .route("/checkout/success", get(pages::checkout_success));

    // Session gate runs before every route; public paths pass straight through
    Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state)
}
