//! Row-level store interface
//!
//! Every operation touches one table with equality filters only. Lookups
//! return `Ok(None)` when no row matches; an `Err` always means the store
//! itself failed.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    Customer, Price, Product, Profile, ProfileUpdate, Subscription, SubscriptionRecord,
    SubscriptionStatus,
};

#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Connectivity probe used by the health endpoints
    async fn ping(&self) -> StoreResult<()>;

    // Profiles

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Returns the number of rows patched (zero when the user is unknown)
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<u64>;

    /// Returns the number of rows deleted (zero when the user is unknown)
    async fn delete_profile(&self, user_id: &str) -> StoreResult<u64>;

    // Customers

    async fn find_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<Customer>>;

    async fn find_customer_by_stripe_id(
        &self,
        stripe_customer_id: &str,
    ) -> StoreResult<Option<Customer>>;

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;

    // Subscriptions

    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>>;

    /// Lookup constrained to the owning user
    async fn find_user_subscription(
        &self,
        stripe_subscription_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Subscription>>;

    /// Most recently created `active` subscription of a user
    async fn find_active_subscription(&self, user_id: &str) -> StoreResult<Option<Subscription>>;

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> StoreResult<Subscription>;

    /// Full overwrite of the row with the given local id
    async fn update_subscription(&self, id: Uuid, record: &SubscriptionRecord) -> StoreResult<()>;

    /// Patches `status` and `ended_at` only. Returns the number of rows patched.
    async fn end_subscription(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> StoreResult<u64>;

    // Products

    async fn find_product(&self, id: &str) -> StoreResult<Option<Product>>;

    async fn insert_product(&self, product: &Product) -> StoreResult<()>;

    async fn update_product(&self, product: &Product) -> StoreResult<()>;

    // Prices

    async fn find_price(&self, id: &str) -> StoreResult<Option<Price>>;

    async fn insert_price(&self, price: &Price) -> StoreResult<()>;

    async fn update_price(&self, price: &Price) -> StoreResult<()>;

    /// Active prices ordered by ascending unit amount
    async fn list_active_prices(&self) -> StoreResult<Vec<Price>>;
}
