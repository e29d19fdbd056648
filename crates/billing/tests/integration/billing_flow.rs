//! Integration tests for the checkout → webhook → verify round trip
//!
//! Runs entirely in memory: `InMemoryStore` for the mirror tables and
//! `MockPaymentProcessor` in place of Stripe.
//!
//! ## Running Tests
//! ```bash
//! cargo test -p plansync-billing --test billing_flow
//! ```

use std::sync::Arc;

use plansync_billing::testing::MockPaymentProcessor;
use plansync_billing::{
    signature_header, BillingError, BillingService, BillingUser, CheckoutSessionInfo,
    USER_ID_METADATA_KEY,
};
use plansync_shared::{InMemoryStore, SubscriptionStatus};
use serde_json::json;
use time::OffsetDateTime;

const WEBHOOK_SECRET: &str = "whsec_integration";

// ============================================================================
// Test Utilities
// ============================================================================

struct Harness {
    store: Arc<InMemoryStore>,
    processor: Arc<MockPaymentProcessor>,
    billing: BillingService,
}

fn setup() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(MockPaymentProcessor::new());
    let billing = BillingService::new(
        store.clone(),
        processor.clone(),
        "https://app.test",
        Some(WEBHOOK_SECRET.to_string()),
    );
    Harness {
        store,
        processor,
        billing,
    }
}

fn caller() -> BillingUser {
    BillingUser {
        user_id: "user_abc".to_string(),
        email: Some("abc@example.com".to_string()),
        name: Some("Abc".to_string()),
    }
}

async fn deliver(billing: &BillingService, body: &str) -> Result<(), BillingError> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let header = signature_header(body, WEBHOOK_SECRET, now)?;
    let event = billing.webhooks.verify_event(body, Some(&header))?;
    billing.webhooks.handle_event(event).await
}

fn subscription_created(customer_id: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    json!({
        "id": "evt_sub_created",
        "type": "customer.subscription.created",
        "data": { "object": {
            "id": "sub_abc",
            "customer": customer_id,
            "status": "active",
            "cancel_at_period_end": false,
            "current_period_start": now,
            "current_period_end": now + 2_592_000,
            "created": now,
            "items": { "data": [{ "price": { "id": "price_pro" }, "quantity": 1 }] }
        }}
    })
    .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_checkout_webhook_verify_round_trip() {
    let h = setup();

    // Catalog arrives first
    deliver(
        &h.billing,
        &json!({
            "id": "evt_prod",
            "type": "product.created",
            "data": { "object": {
                "id": "prod_pro", "active": true, "name": "Pro",
                "description": "Unlimited projects、Priority support"
            }}
        })
        .to_string(),
    )
    .await
    .unwrap();
    deliver(
        &h.billing,
        &json!({
            "id": "evt_price",
            "type": "price.created",
            "data": { "object": {
                "id": "price_pro", "product": "prod_pro", "active": true,
                "unit_amount": 1900, "currency": "usd", "type": "recurring",
                "recurring": { "interval": "month", "interval_count": 1 }
            }}
        })
        .to_string(),
    )
    .await
    .unwrap();

    let plans = h.billing.catalog.pricing_plans().await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].features.len(), 2);

    // Checkout creates the customer mapping
    h.billing
        .checkout
        .create_checkout(&caller(), "price_pro")
        .await
        .unwrap();
    let customers = h.store.customers().await;
    assert_eq!(customers.len(), 1);
    let stripe_customer_id = customers[0].stripe_customer_id.clone();

    // Processor reports the subscription
    deliver(&h.billing, &subscription_created(&stripe_customer_id))
        .await
        .unwrap();

    // The completed session now verifies
    let mut metadata = plansync_shared::Metadata::new();
    metadata.insert(USER_ID_METADATA_KEY.to_string(), "user_abc".to_string());
    h.processor.insert_session(CheckoutSessionInfo {
        id: "cs_done".to_string(),
        url: None,
        metadata,
        subscription_id: Some("sub_abc".to_string()),
    });

    let subscription = h
        .billing
        .checkout
        .verify_checkout("cs_done", "user_abc")
        .await
        .unwrap();
    assert_eq!(subscription.record.status, SubscriptionStatus::Active);
    assert_eq!(subscription.record.price_id.as_deref(), Some("price_pro"));

    let dashboard = h.billing.catalog.dashboard("user_abc").await.unwrap().unwrap();
    assert_eq!(dashboard.product.map(|p| p.name), Some("Pro".to_string()));
}

#[tokio::test]
async fn test_subscription_before_checkout_is_unresolved() {
    let h = setup();
    let result = deliver(&h.billing, &subscription_created("cus_unknown")).await;
    assert!(matches!(result, Err(BillingError::UnresolvedCustomer(_))));
    assert!(h.store.subscriptions().await.is_empty());
}

#[tokio::test]
async fn test_tampered_delivery_rejected_without_writes() {
    let h = setup();
    let body = subscription_created("cus_1");
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let header = signature_header(&body, WEBHOOK_SECRET, now).unwrap();
    let tampered = body.replace("active", "canceled");

    let result = h.billing.webhooks.verify_event(&tampered, Some(&header));
    assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    assert_eq!(h.store.mutation_count(), 0);
}
