//! Stripe webhook handling
//!
//! Mirrors subscription, product and price state into the store. Every
//! reconciliation step writes exactly one row; there is no idempotency
//! ledger, so redelivery simply rewrites the same row.

use std::sync::Arc;

use plansync_shared::BillingStore;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::events::{
    BillingEvent, PricePayload, ProductPayload, StripeEvent, SubscriptionChange,
    SubscriptionPayload,
};
use crate::signature::verify_signature;

/// Webhook handler for Stripe events
pub struct WebhookHandler {
    store: Arc<dyn BillingStore>,
    webhook_secret: Option<String>,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn BillingStore>, webhook_secret: Option<String>) -> Self {
        Self {
            store,
            webhook_secret,
        }
    }

    /// Verify the signature and parse the delivery
    pub fn verify_event(&self, payload: &str, signature: Option<&str>) -> BillingResult<StripeEvent> {
        self.verify_event_at(payload, signature, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Same as [`verify_event`](Self::verify_event) with an explicit clock
    pub fn verify_event_at(
        &self,
        payload: &str,
        signature: Option<&str>,
        now: i64,
    ) -> BillingResult<StripeEvent> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            tracing::error!("STRIPE_WEBHOOK_SECRET not configured; rejecting webhook");
            return Err(BillingError::WebhookSignatureInvalid);
        };
        let Some(signature) = signature else {
            tracing::warn!("Missing Stripe-Signature header");
            return Err(BillingError::WebhookSignatureInvalid);
        };

        verify_signature(payload, signature, secret, now)?;

        let event = StripeEvent::parse(payload).map_err(|e| {
            tracing::error!(parse_error = %e, "Failed to parse webhook event JSON");
            e
        })?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Webhook signature verified"
        );

        Ok(event)
    }

    /// Apply a verified event to the store
    pub async fn handle_event(&self, event: StripeEvent) -> BillingResult<()> {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing Stripe webhook"
        );

        match event.event {
            BillingEvent::SubscriptionChanged(change, payload) => {
                if change == SubscriptionChange::Created {
                    tracing::debug!(stripe_subscription_id = %payload.id, "Subscription created");
                }
                self.reconcile_subscription(&payload).await?;
            }
            BillingEvent::SubscriptionDeleted(payload) => {
                self.mark_subscription_ended(&payload).await?;
            }
            BillingEvent::ProductChanged(payload) => {
                self.upsert_product(&payload).await?;
            }
            BillingEvent::PriceChanged(payload) => {
                self.upsert_price(&payload).await?;
            }
            BillingEvent::Unhandled => {
                tracing::info!(
                    event_type = %event.event_type,
                    event_id = %event.id,
                    "Received unhandled Stripe event type - no handler configured"
                );
            }
        }

        Ok(())
    }

    /// Create or fully overwrite the subscription row
    pub async fn reconcile_subscription(&self, payload: &SubscriptionPayload) -> BillingResult<()> {
        let stripe_customer_id = payload.customer.id();
        let customer = self
            .store
            .find_customer_by_stripe_id(stripe_customer_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    stripe_customer_id = %stripe_customer_id,
                    stripe_subscription_id = %payload.id,
                    "No local customer for subscription event"
                );
                BillingError::UnresolvedCustomer(stripe_customer_id.to_string())
            })?;

        let record = payload.to_record(&customer.user_id)?;

        match self.store.find_subscription_by_stripe_id(&payload.id).await? {
            Some(existing) => {
                self.store.update_subscription(existing.id, &record).await?;
                tracing::info!(
                    user_id = %record.user_id,
                    stripe_subscription_id = %record.stripe_subscription_id,
                    status = %record.status,
                    "Subscription updated"
                );
            }
            None => {
                let created = self.store.insert_subscription(&record).await?;
                tracing::info!(
                    user_id = %record.user_id,
                    stripe_subscription_id = %record.stripe_subscription_id,
                    subscription_id = %created.id,
                    status = %record.status,
                    "Subscription inserted"
                );
            }
        }

        Ok(())
    }

    /// Patch only status and ended_at; unknown subscriptions are ignored
    pub async fn mark_subscription_ended(&self, payload: &SubscriptionPayload) -> BillingResult<()> {
        let ended_at = payload.ended_at()?;
        let patched = self
            .store
            .end_subscription(&payload.id, payload.status, ended_at)
            .await?;

        if patched == 0 {
            tracing::debug!(
                stripe_subscription_id = %payload.id,
                "Deleted subscription has no local row"
            );
        } else {
            tracing::info!(
                stripe_subscription_id = %payload.id,
                status = %payload.status,
                "Subscription marked ended"
            );
        }

        Ok(())
    }

    pub async fn upsert_product(&self, payload: &ProductPayload) -> BillingResult<()> {
        let product = payload.to_row();

        if self.store.find_product(&product.id).await?.is_some() {
            self.store.update_product(&product).await?;
        } else {
            self.store.insert_product(&product).await?;
        }

        tracing::info!(product_id = %product.id, active = product.active, "Product synced");
        Ok(())
    }

    pub async fn upsert_price(&self, payload: &PricePayload) -> BillingResult<()> {
        let price = payload.to_row();

        if self.store.find_price(&price.id).await?.is_some() {
            self.store.update_price(&price).await?;
        } else {
            self.store.insert_price(&price).await?;
        }

        tracing::info!(
            price_id = %price.id,
            product_id = %price.product_id,
            active = price.active,
            "Price synced"
        );
        Ok(())
    }
}
