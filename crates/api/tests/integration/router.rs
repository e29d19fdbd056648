//! Router-level tests for route protection, checkout and both webhooks
//!
//! The router runs over `InMemoryStore` and `MockPaymentProcessor`; requests
//! are driven with `tower::ServiceExt::oneshot`.
//!
//! ## Running Tests
//! ```bash
//! cargo test -p plansync-api --test router
//! ```

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jsonwebtoken::{encode, EncodingKey, Header};
use plansync_api::{
    auth::{SessionClaims, SessionVerifier},
    config::SessionKey,
    create_router,
    identity::SvixVerifier,
    AppState, Config,
};
use plansync_billing::testing::MockPaymentProcessor;
use plansync_billing::{signature_header, CheckoutSessionInfo, USER_ID_METADATA_KEY};
use plansync_shared::{BillingStore, InMemoryStore, Metadata};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;

const JWT_SECRET: &str = "router-test-secret-with-32-chars!!";
const STRIPE_SECRET: &str = "whsec_router_stripe";

// ============================================================================
// Test Utilities
// ============================================================================

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    processor: Arc<MockPaymentProcessor>,
    clerk_secret: String,
}

fn config(stripe_secret: Option<&str>, clerk_secret: Option<&str>) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        app_url: "https://app.test".to_string(),
        allowed_origins: vec!["https://app.test".to_string()],
        log_json: false,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        run_migrations: false,
        stripe_secret_key: "sk_test_unused".to_string(),
        stripe_webhook_secret: stripe_secret.map(String::from),
        clerk_webhook_secret: clerk_secret.map(String::from),
        session_key: SessionKey::SharedSecret(JWT_SECRET.to_string()),
        sign_in_url: "https://accounts.test/sign-in".to_string(),
        sign_up_url: "https://accounts.test/sign-up".to_string(),
    }
}

fn harness_with(stripe_secret: Option<&str>, with_clerk_secret: bool) -> Harness {
    let clerk_secret = format!("whsec_{}", BASE64.encode(b"router-identity-key"));
    let config = config(
        stripe_secret,
        with_clerk_secret.then_some(clerk_secret.as_str()),
    );
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(MockPaymentProcessor::new());
    let sessions = SessionVerifier::new(&config.session_key).unwrap();
    let state = AppState::new(config, store.clone(), processor.clone(), sessions);

    Harness {
        app: create_router(state),
        store,
        processor,
        clerk_secret,
    }
}

fn harness() -> Harness {
    harness_with(Some(STRIPE_SECRET), true)
}

fn session_token(user_id: &str) -> String {
    let claims = SessionClaims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        name: None,
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        exp: OffsetDateTime::now_utc().unix_timestamp() + 600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn authed(method: &str, uri: &str, user_id: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", session_token(user_id)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn stripe_delivery(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhook/stripe")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn clerk_delivery(h: &Harness, body: &str) -> Request<Body> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let signature = SvixVerifier::new(&h.clerk_secret)
        .unwrap()
        .sign("msg_router", now, body)
        .unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/webhook/clerk")
        .header("svix-id", "msg_router")
        .header("svix-timestamp", now.to_string())
        .header("svix-signature", format!("v1,{}", signature))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn product_event() -> String {
    json!({
        "id": "evt_prod",
        "type": "product.created",
        "data": { "object": {
            "id": "prod_pro",
            "active": true,
            "name": "Pro",
            "description": "Unlimited plans, Priority support",
            "images": [],
            "metadata": {}
        }}
    })
    .to_string()
}

// ============================================================================
// Route protection
// ============================================================================

#[tokio::test]
async fn test_protected_routes_require_session() {
    let h = harness();

    for uri in ["/dashboard", "/pricing", "/api/checkout/verify?session_id=cs_1"] {
        let response = send(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let response = send(
        &h.app,
        Request::get("/dashboard")
            .header(header::AUTHORIZATION, "Bearer forged.token.value")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_public_routes_and_session_cookie() {
    let h = harness();

    let response = send(&h.app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["links"]["pricing"], "https://app.test/pricing");

    let response = send(&h.app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &h.app,
        Request::get("/dashboard")
            .header(header::COOKIE, format!("__session={}", session_token("user_cookie")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], "user_cookie");
    assert_eq!(body["user"]["name"], "Test User");
    assert!(body["subscription"].is_null());
}

#[tokio::test]
async fn test_sign_in_redirect_passes_redirect_url() {
    let h = harness();
    let response = send(
        &h.app,
        Request::get("/auth/sign-in?redirect_url=%2Fpricing")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://accounts.test/sign-in?redirect_url=%2Fpricing"
    );
}

#[tokio::test]
async fn test_health_reports_store_outage() {
    let h = harness();
    h.store.set_fail_reads(true);

    let response = send(&h.app, Request::get("/health/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(&h.app, Request::get("/health/live").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_creates_customer_once() {
    let h = harness();
    let body = || Body::from(json!({ "priceId": "price_pro" }).to_string());

    for _ in 0..2 {
        let response = send(&h.app, authed("POST", "/api/checkout", "user_1", body())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let url = json_body(response).await["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("https://checkout.stripe.test/pay/"));
    }

    assert_eq!(h.processor.created_customers().len(), 1);
    assert_eq!(h.store.customers().await.len(), 1);

    let requests = h.processor.checkout_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].customer_id, requests[1].customer_id);
    assert_eq!(requests[0].metadata.get(USER_ID_METADATA_KEY).unwrap(), "user_1");
}

#[tokio::test]
async fn test_checkout_validation_and_upstream_failure() {
    let h = harness();

    let response = send(
        &h.app,
        authed("POST", "/api/checkout", "user_1", Body::from("{}")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    h.processor.set_fail_requests(true);
    let response = send(
        &h.app,
        authed(
            "POST",
            "/api/checkout",
            "user_1",
            Body::from(json!({ "priceId": "price_pro" }).to_string()),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_verify_rejects_missing_and_foreign_sessions() {
    let h = harness();

    let response = send(
        &h.app,
        authed("GET", "/api/checkout/verify", "user_1", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut metadata = Metadata::new();
    metadata.insert(USER_ID_METADATA_KEY.to_string(), "user_other".to_string());
    h.processor.insert_session(CheckoutSessionInfo {
        id: "cs_foreign".to_string(),
        url: None,
        metadata,
        subscription_id: Some("sub_other".to_string()),
    });

    for uri in [
        "/api/checkout/verify?session_id=cs_foreign",
        "/checkout/success?session_id=cs_foreign",
    ] {
        let response = send(&h.app, authed("GET", uri, "user_1", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }

    let response = send(
        &h.app,
        authed("GET", "/api/checkout/verify?session_id=cs_missing", "user_1", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Stripe webhook
// ============================================================================

#[tokio::test]
async fn test_stripe_invalid_signature_changes_nothing() {
    let h = harness();
    let body = product_event();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let forged = signature_header(&body, "whsec_someone_else", now).unwrap();

    for signature in [Some(forged), None] {
        let response = send(&h.app, stripe_delivery(&body, signature)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(h.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_stripe_without_secret_rejects_delivery() {
    let h = harness_with(None, true);
    let body = product_event();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let signature = signature_header(&body, STRIPE_SECRET, now).unwrap();

    let response = send(&h.app, stripe_delivery(&body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_stripe_product_event_reaches_pricing_mirror() {
    let h = harness();
    let body = product_event();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let signature = signature_header(&body, STRIPE_SECRET, now).unwrap();

    let response = send(&h.app, stripe_delivery(&body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "received": true }));

    let product = h.store.find_product("prod_pro").await.unwrap().unwrap();
    assert_eq!(product.name, "Pro");
}

#[tokio::test]
async fn test_stripe_unhandled_and_failing_events() {
    let h = harness();
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let unhandled = json!({
        "id": "evt_invoice",
        "type": "invoice.paid",
        "data": { "object": { "id": "in_1" } }
    })
    .to_string();
    let signature = signature_header(&unhandled, STRIPE_SECRET, now).unwrap();
    let response = send(&h.app, stripe_delivery(&unhandled, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::OK);

    h.store.set_fail_writes(true);
    let body = product_event();
    let signature = signature_header(&body, STRIPE_SECRET, now).unwrap();
    let response = send(&h.app, stripe_delivery(&body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "WEBHOOK_FAILED");
}

// ============================================================================
// Identity webhook
// ============================================================================

#[tokio::test]
async fn test_clerk_user_lifecycle() {
    let h = harness();

    let created = json!({
        "type": "user.created",
        "data": {
            "id": "user_9",
            "email_addresses": [{ "email_address": "nine@example.com" }],
            "first_name": "Nina",
            "last_name": "",
            "image_url": "https://img.test/nine.png"
        }
    })
    .to_string();
    let response = send(&h.app, clerk_delivery(&h, &created)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Webhook processed");

    let profile = h.store.find_profile("user_9").await.unwrap().unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("Nina"));
    assert_eq!(profile.email.as_deref(), Some("nine@example.com"));

    let deleted = json!({ "type": "user.deleted", "data": { "id": "user_9" } }).to_string();
    let response = send(&h.app, clerk_delivery(&h, &deleted)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.store.find_profile("user_9").await.unwrap().is_none());

    // Deleting again still succeeds
    let response = send(&h.app, clerk_delivery(&h, &deleted)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clerk_rejects_unsigned_and_tampered_deliveries() {
    let h = harness();

    let response = send(
        &h.app,
        Request::post("/api/webhook/clerk")
            .body(Body::from(r#"{"type":"user.deleted","data":{"id":"u"}}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let signed = json!({ "type": "user.deleted", "data": { "id": "u" } }).to_string();
    let mut request = clerk_delivery(&h, &signed);
    *request.body_mut() = Body::from(r#"{"type":"user.deleted","data":{"id":"victim"}}"#);
    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_SIGNATURE");
    assert_eq!(h.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_clerk_without_secret_is_server_error() {
    let h = harness_with(Some(STRIPE_SECRET), false);
    let response = send(
        &h.app,
        Request::post("/api/webhook/clerk")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
