//! In-memory store used by tests and local demos

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::BillingStore;
use crate::types::{
    Customer, Price, Product, Profile, ProfileUpdate, Subscription, SubscriptionRecord,
    SubscriptionStatus,
};

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    customers: Vec<Customer>,
    subscriptions: Vec<Subscription>,
    products: HashMap<String, Product>,
    prices: HashMap<String, Price>,
}

/// Store keeping every table in process memory.
///
/// Uniqueness mirrors the Postgres schema: one customer per user, one
/// subscription per processor id, primary keys on everything else.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    mutations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail with a database error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a database error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub async fn profiles(&self) -> Vec<Profile> {
        self.tables.read().await.profiles.values().cloned().collect()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.tables.read().await.customers.clone()
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.tables.read().await.subscriptions.clone()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.tables.read().await.products.values().cloned().collect()
    }

    pub async fn prices(&self) -> Vec<Price> {
        self.tables.read().await.prices.values().cloned().collect()
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_read()
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.check_read()?;
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if tables.profiles.contains_key(&profile.user_id) {
            return Err(StoreError::Conflict(format!(
                "profile {} already exists",
                profile.user_id
            )));
        }
        tables
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        self.record_write();
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<u64> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        let Some(profile) = tables.profiles.get_mut(user_id) else {
            return Ok(0);
        };
        profile.email = update.email.clone();
        profile.full_name = update.full_name.clone();
        profile.avatar_url = update.avatar_url.clone();
        profile.updated_at = update.updated_at;
        self.record_write();
        Ok(1)
    }

    async fn delete_profile(&self, user_id: &str) -> StoreResult<u64> {
        self.check_write()?;
        let removed = self.tables.write().await.profiles.remove(user_id);
        if removed.is_none() {
            return Ok(0);
        }
        self.record_write();
        Ok(1)
    }

    async fn find_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<Customer>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .iter()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn find_customer_by_stripe_id(
        &self,
        stripe_customer_id: &str,
    ) -> StoreResult<Option<Customer>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .iter()
            .find(|c| c.stripe_customer_id == stripe_customer_id)
            .cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if tables
            .customers
            .iter()
            .any(|c| c.user_id == customer.user_id)
        {
            return Err(StoreError::Conflict(format!(
                "customer for {} already exists",
                customer.user_id
            )));
        }
        tables.customers.push(customer.clone());
        self.record_write();
        Ok(())
    }

    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| s.record.stripe_subscription_id == stripe_subscription_id)
            .cloned())
    }

    async fn find_user_subscription(
        &self,
        stripe_subscription_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| {
                s.record.stripe_subscription_id == stripe_subscription_id
                    && s.record.user_id == user_id
            })
            .cloned())
    }

    async fn find_active_subscription(&self, user_id: &str) -> StoreResult<Option<Subscription>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|s| s.record.user_id == user_id)
            .filter(|s| s.record.status == SubscriptionStatus::Active)
            .max_by_key(|s| s.record.created_at)
            .cloned())
    }

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> StoreResult<Subscription> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if tables
            .subscriptions
            .iter()
            .any(|s| s.record.stripe_subscription_id == record.stripe_subscription_id)
        {
            return Err(StoreError::Conflict(format!(
                "subscription {} already exists",
                record.stripe_subscription_id
            )));
        }
        let subscription = Subscription {
            id: Uuid::new_v4(),
            record: record.clone(),
        };
        tables.subscriptions.push(subscription.clone());
        self.record_write();
        Ok(subscription)
    }

    async fn update_subscription(&self, id: Uuid, record: &SubscriptionRecord) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if let Some(row) = tables.subscriptions.iter_mut().find(|s| s.id == id) {
            row.record = record.clone();
            self.record_write();
        }
        Ok(())
    }

    async fn end_subscription(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> StoreResult<u64> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        let mut patched = 0;
        for row in tables
            .subscriptions
            .iter_mut()
            .filter(|s| s.record.stripe_subscription_id == stripe_subscription_id)
        {
            row.record.status = status;
            row.record.ended_at = ended_at;
            patched += 1;
        }
        if patched > 0 {
            self.record_write();
        }
        Ok(patched)
    }

    async fn find_product(&self, id: &str) -> StoreResult<Option<Product>> {
        self.check_read()?;
        Ok(self.tables.read().await.products.get(id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        tables.products.insert(product.id.clone(), product.clone());
        self.record_write();
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if let Some(row) = tables.products.get_mut(&product.id) {
            *row = product.clone();
            self.record_write();
        }
        Ok(())
    }

    async fn find_price(&self, id: &str) -> StoreResult<Option<Price>> {
        self.check_read()?;
        Ok(self.tables.read().await.prices.get(id).cloned())
    }

    async fn insert_price(&self, price: &Price) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if tables.prices.contains_key(&price.id) {
            return Err(StoreError::Conflict(format!(
                "price {} already exists",
                price.id
            )));
        }
        tables.prices.insert(price.id.clone(), price.clone());
        self.record_write();
        Ok(())
    }

    async fn update_price(&self, price: &Price) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        if let Some(row) = tables.prices.get_mut(&price.id) {
            *row = price.clone();
            self.record_write();
        }
        Ok(())
    }

    async fn list_active_prices(&self) -> StoreResult<Vec<Price>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let mut prices: Vec<Price> = tables.prices.values().filter(|p| p.active).cloned().collect();
        prices.sort_by(|a, b| a.unit_amount.cmp(&b.unit_amount).then_with(|| a.id.cmp(&b.id)));
        Ok(prices)
    }
}
