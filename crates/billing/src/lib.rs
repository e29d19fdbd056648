// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plansync Billing Module
//!
//! Handles the Stripe side of the product.
//!
//! ## Features
//!
//! - **Checkout**: Create or reuse a Stripe customer and open subscription checkouts
//! - **Verification**: Confirm a completed checkout belongs to the caller
//! - **Webhooks**: Mirror subscription, product and price events into the store
//! - **Catalog**: Pricing plans and dashboard read models

pub mod catalog;
pub mod checkout;
pub mod client;
pub mod customer;
pub mod error;
pub mod events;
pub mod signature;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod webhooks;

use std::sync::Arc;

use plansync_shared::BillingStore;

// Catalog
pub use catalog::{parse_features, CatalogService, DashboardSubscription, PricingPlan};

// Checkout
pub use checkout::CheckoutService;

// Client
pub use client::{
    CheckoutRequest, CheckoutSessionInfo, NewCustomer, PaymentProcessor, StripeClient,
    StripeConfig,
};

// Customer
pub use customer::{BillingUser, CustomerService, USER_ID_METADATA_KEY};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{BillingEvent, StripeEvent, SubscriptionChange};

// Signature
pub use signature::{signature_header, verify_signature, SIGNATURE_TOLERANCE_SECS};

// Webhooks
pub use webhooks::WebhookHandler;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub checkout: CheckoutService,
    pub catalog: CatalogService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a billing service over a payment processor
    pub fn new(
        store: Arc<dyn BillingStore>,
        processor: Arc<dyn PaymentProcessor>,
        app_base_url: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            checkout: CheckoutService::new(store.clone(), processor, app_base_url),
            catalog: CatalogService::new(store.clone()),
            webhooks: WebhookHandler::new(store, webhook_secret),
        }
    }
}
