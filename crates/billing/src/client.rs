//! Stripe client configuration and the payment-processor interface

use async_trait::async_trait;
use plansync_shared::Metadata;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCustomer, Customer, CustomerId, StripeError,
};

use crate::error::{BillingError, BillingResult};

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
}

/// Customer to create at the processor
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: Metadata,
}

/// Parameters for a single-price subscription checkout
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Metadata,
}

/// The parts of a checkout session this service reads back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: Option<String>,
    pub metadata: Metadata,
    pub subscription_id: Option<String>,
}

/// Operations performed against the external payment processor
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a customer and return its processor id
    async fn create_customer(&self, customer: &NewCustomer) -> BillingResult<String>;

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo>;

    /// Returns `Ok(None)` when the processor does not know the session
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> BillingResult<Option<CheckoutSessionInfo>>;
}

/// Stripe billing client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client from config
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(&config.secret_key),
        }
    }

    /// Get the inner Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

impl From<CheckoutSession> for CheckoutSessionInfo {
    fn from(session: CheckoutSession) -> Self {
        Self {
            id: session.id.to_string(),
            url: session.url,
            metadata: session.metadata.unwrap_or_default(),
            subscription_id: session.subscription.map(|s| s.id().to_string()),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_customer(&self, customer: &NewCustomer) -> BillingResult<String> {
        let params = CreateCustomer {
            email: customer.email.as_deref(),
            name: customer.name.as_deref(),
            metadata: Some(customer.metadata.clone()),
            ..Default::default()
        };

        let created = Customer::create(self.inner(), params).await?;

        tracing::info!(customer_id = %created.id, "Created Stripe customer");

        Ok(created.id.to_string())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo> {
        let customer_id = request
            .customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid customer ID: {}", e)))?;

        let params = CreateCheckoutSession {
            customer: Some(customer_id),
            mode: Some(CheckoutSessionMode::Subscription),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(request.price_id.clone()),
                quantity: Some(1),
                ..Default::default()
            }]),
            success_url: Some(&request.success_url),
            cancel_url: Some(&request.cancel_url),
            metadata: Some(request.metadata.clone()),
            billing_address_collection: Some(stripe::CheckoutSessionBillingAddressCollection::Auto),
            ..Default::default()
        };

        let session = CheckoutSession::create(self.inner(), params).await?;

        tracing::info!(
            session_id = %session.id,
            price_id = %request.price_id,
            "Created checkout session"
        );

        Ok(session.into())
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> BillingResult<Option<CheckoutSessionInfo>> {
        let Ok(session_id) = session_id.parse::<CheckoutSessionId>() else {
            tracing::debug!(session_id = %session_id, "Malformed checkout session ID");
            return Ok(None);
        };

        match CheckoutSession::retrieve(self.inner(), &session_id, &[]).await {
            Ok(session) => Ok(Some(session.into())),
            Err(StripeError::Stripe(err)) if err.http_status == 404 => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
