//! Stripe Checkout sessions

use std::sync::Arc;

use plansync_shared::{BillingStore, Metadata, Subscription};

use crate::client::{CheckoutRequest, PaymentProcessor};
use crate::customer::{BillingUser, CustomerService, USER_ID_METADATA_KEY};
use crate::error::{BillingError, BillingResult};

/// Checkout service for creating and verifying Stripe checkout sessions
pub struct CheckoutService {
    store: Arc<dyn BillingStore>,
    processor: Arc<dyn PaymentProcessor>,
    customers: CustomerService,
    app_base_url: String,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        processor: Arc<dyn PaymentProcessor>,
        app_base_url: impl Into<String>,
    ) -> Self {
        let customers = CustomerService::new(store.clone(), processor.clone());
        Self {
            store,
            processor,
            customers,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.app_base_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/pricing", self.app_base_url)
    }

    /// Open a subscription checkout for `price_id` and return its redirect URL
    pub async fn create_checkout(&self, user: &BillingUser, price_id: &str) -> BillingResult<String> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return Err(BillingError::InvalidInput("priceId is required".to_string()));
        }

        let customer_id = self.customers.get_or_create_customer(user).await?;

        let mut metadata = Metadata::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user.user_id.clone());

        let session = self
            .processor
            .create_checkout_session(&CheckoutRequest {
                customer_id,
                price_id: price_id.to_string(),
                success_url: self.success_url(),
                cancel_url: self.cancel_url(),
                metadata,
            })
            .await?;

        tracing::info!(
            user_id = %user.user_id,
            session_id = %session.id,
            price_id = %price_id,
            "Created checkout session"
        );

        session
            .url
            .ok_or_else(|| BillingError::StripeApi("Checkout session has no URL".to_string()))
    }

    /// Confirm a completed session belongs to `user_id` and return the mirrored subscription
    pub async fn verify_checkout(&self, session_id: &str, user_id: &str) -> BillingResult<Subscription> {
        let session = self
            .processor
            .retrieve_checkout_session(session_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("Checkout session not found".to_string()))?;

        let owner = session.metadata.get(USER_ID_METADATA_KEY).map(String::as_str);
        if owner != Some(user_id) {
            tracing::warn!(
                session_id = %session.id,
                user_id = %user_id,
                "Checkout session belongs to another user"
            );
            return Err(BillingError::Forbidden(
                "Checkout session does not belong to this user".to_string(),
            ));
        }

        let stripe_subscription_id = session.subscription_id.ok_or_else(|| {
            BillingError::NotFound("Checkout session has no subscription".to_string())
        })?;

        let subscription = self
            .store
            .find_user_subscription(&stripe_subscription_id, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("Subscription not found".to_string()))?;

        tracing::info!(
            user_id = %user_id,
            stripe_subscription_id = %stripe_subscription_id,
            "Checkout verified"
        );

        Ok(subscription)
    }
}
