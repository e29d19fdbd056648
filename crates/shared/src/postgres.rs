//! Postgres implementation of the row-level store

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::BillingStore;
use crate::types::{
    Customer, Price, Product, Profile, ProfileUpdate, Subscription, SubscriptionRecord,
    SubscriptionStatus,
};

const PROFILE_COLUMNS: &str = "user_id, email, full_name, avatar_url, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, stripe_subscription_id, status, price_id, \
     quantity, cancel_at_period_end, cancel_at, canceled_at, current_period_start, \
     current_period_end, created_at, ended_at, trial_start, trial_end";

const PRODUCT_COLUMNS: &str = "id, active, name, description, image, metadata";

const PRICE_COLUMNS: &str = "id, product_id, active, description, unit_amount, currency, type, \
     interval, interval_count, trial_period_days, metadata";

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, full_name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET email = $2, full_name = $3, avatar_url = $4, updated_at = $5
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(&update.avatar_url)
        .bind(update.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_profile(&self, user_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_customer_by_user_id(&self, user_id: &str) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT user_id, stripe_customer_id FROM customers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn find_customer_by_stripe_id(
        &self,
        stripe_customer_id: &str,
    ) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT user_id, stripe_customer_id FROM customers WHERE stripe_customer_id = $1",
        )
        .bind(stripe_customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query("INSERT INTO customers (user_id, stripe_customer_id) VALUES ($1, $2)")
            .bind(&customer.user_id)
            .bind(&customer.stripe_customer_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = $1"
        ))
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn find_user_subscription(
        &self,
        stripe_subscription_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE stripe_subscription_id = $1 AND user_id = $2"
        ))
        .bind(stripe_subscription_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn find_active_subscription(&self, user_id: &str) -> StoreResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = 'active' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> StoreResult<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&record.user_id)
        .bind(&record.stripe_subscription_id)
        .bind(record.status)
        .bind(&record.price_id)
        .bind(record.quantity)
        .bind(record.cancel_at_period_end)
        .bind(record.cancel_at)
        .bind(record.canceled_at)
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.created_at)
        .bind(record.ended_at)
        .bind(record.trial_start)
        .bind(record.trial_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn update_subscription(&self, id: Uuid, record: &SubscriptionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions SET
                user_id = $2,
                stripe_subscription_id = $3,
                status = $4,
                price_id = $5,
                quantity = $6,
                cancel_at_period_end = $7,
                cancel_at = $8,
                canceled_at = $9,
                current_period_start = $10,
                current_period_end = $11,
                created_at = $12,
                ended_at = $13,
                trial_start = $14,
                trial_end = $15
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&record.user_id)
        .bind(&record.stripe_subscription_id)
        .bind(record.status)
        .bind(&record.price_id)
        .bind(record.quantity)
        .bind(record.cancel_at_period_end)
        .bind(record.cancel_at)
        .bind(record.canceled_at)
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.created_at)
        .bind(record.ended_at)
        .bind(record.trial_start)
        .bind(record.trial_end)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn end_subscription(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = $2, ended_at = $3 WHERE stripe_subscription_id = $1",
        )
        .bind(stripe_subscription_id)
        .bind(status)
        .bind(ended_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_product(&self, id: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(&product.id)
        .bind(product.active)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image)
        .bind(&product.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET active = $2, name = $3, description = $4, image = $5, metadata = $6
            WHERE id = $1
            "#,
        )
        .bind(&product.id)
        .bind(product.active)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image)
        .bind(&product.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_price(&self, id: &str) -> StoreResult<Option<Price>> {
        let price = sqlx::query_as::<_, Price>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(price)
    }

    async fn insert_price(&self, price: &Price) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO prices ({PRICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(&price.id)
        .bind(&price.product_id)
        .bind(price.active)
        .bind(&price.description)
        .bind(price.unit_amount)
        .bind(&price.currency)
        .bind(price.price_type)
        .bind(price.interval)
        .bind(price.interval_count)
        .bind(price.trial_period_days)
        .bind(&price.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_price(&self, price: &Price) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE prices SET
                product_id = $2,
                active = $3,
                description = $4,
                unit_amount = $5,
                currency = $6,
                type = $7,
                interval = $8,
                interval_count = $9,
                trial_period_days = $10,
                metadata = $11
            WHERE id = $1
            "#,
        )
        .bind(&price.id)
        .bind(&price.product_id)
        .bind(price.active)
        .bind(&price.description)
        .bind(price.unit_amount)
        .bind(&price.currency)
        .bind(price.price_type)
        .bind(price.interval)
        .bind(price.interval_count)
        .bind(price.trial_period_days)
        .bind(&price.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active_prices(&self) -> StoreResult<Vec<Price>> {
        let prices = sqlx::query_as::<_, Price>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices WHERE active = TRUE ORDER BY unit_amount ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use crate::types::Metadata;
    use sqlx::types::Json;

    async fn setup_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url, 2).await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to apply schema");
        PgStore::new(pool)
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_product_insert_then_update_keeps_one_row() {
        let store = setup_store().await;
        let id = format!("prod_test_{}", Uuid::new_v4().simple());
        let mut product = Product {
            id: id.clone(),
            active: true,
            name: "Starter".to_string(),
            description: None,
            image: None,
            metadata: Json(Metadata::new()),
        };

        store.insert_product(&product).await.unwrap();
        product.active = false;
        store.update_product(&product).await.unwrap();

        let stored = store.find_product(&id).await.unwrap().unwrap();
        assert!(!stored.active);

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(&id)
            .execute(store.pool())
            .await
            .ok();
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_end_subscription_on_unknown_id_is_noop() {
        let store = setup_store().await;
        let patched = store
            .end_subscription("sub_does_not_exist", SubscriptionStatus::Canceled, None)
            .await
            .unwrap();
        assert_eq!(patched, 0);
    }
}
