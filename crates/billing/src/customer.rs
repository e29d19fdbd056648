//! Stripe customer management

use std::sync::Arc;

use plansync_shared::{BillingStore, Customer, Metadata};

use crate::client::{NewCustomer, PaymentProcessor};
use crate::error::BillingResult;

/// Metadata key linking processor objects back to the local user
pub const USER_ID_METADATA_KEY: &str = "userId";

/// The signed-in user on whose behalf billing operations run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingUser {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Customer service for mapping local users to Stripe customers
pub struct CustomerService {
    store: Arc<dyn BillingStore>,
    processor: Arc<dyn PaymentProcessor>,
}

impl CustomerService {
    pub fn new(store: Arc<dyn BillingStore>, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { store, processor }
    }

    /// Return the user's Stripe customer id, creating the customer on first use.
    ///
    /// Two concurrent first checkouts for the same user can both reach the
    /// processor; the second insert then fails on the unique user id.
    pub async fn get_or_create_customer(&self, user: &BillingUser) -> BillingResult<String> {
        if let Some(existing) = self.store.find_customer_by_user_id(&user.user_id).await? {
            return Ok(existing.stripe_customer_id);
        }

        let (email, name) = self.contact_details(user).await?;

        let mut metadata = Metadata::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user.user_id.clone());

        let stripe_customer_id = self
            .processor
            .create_customer(&NewCustomer {
                email,
                name,
                metadata,
            })
            .await?;

        self.store
            .insert_customer(&Customer {
                user_id: user.user_id.clone(),
                stripe_customer_id: stripe_customer_id.clone(),
            })
            .await?;

        tracing::info!(
            user_id = %user.user_id,
            customer_id = %stripe_customer_id,
            "Created Stripe customer"
        );

        Ok(stripe_customer_id)
    }

    /// Session claims first, then the mirrored profile
    async fn contact_details(
        &self,
        user: &BillingUser,
    ) -> BillingResult<(Option<String>, Option<String>)> {
        if user.email.is_some() && user.name.is_some() {
            return Ok((user.email.clone(), user.name.clone()));
        }

        let profile = self.store.find_profile(&user.user_id).await?;
        let email = user
            .email
            .clone()
            .or_else(|| profile.as_ref().and_then(|p| p.email.clone()));
        let name = user
            .name
            .clone()
            .or_else(|| profile.as_ref().and_then(|p| p.full_name.clone()));

        Ok((email, name))
    }
}
