//! Read models over the mirrored catalog: pricing plans and the dashboard

use std::sync::Arc;

use plansync_shared::{BillingStore, Price, PriceType, PricingInterval, Product, Subscription};
use serde::Serialize;

use crate::error::BillingResult;

/// One purchasable plan on the pricing view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingPlan {
    pub price_id: String,
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub unit_amount: i64,
    pub currency: String,
    #[serde(rename = "type")]
    pub price_type: PriceType,
    pub interval: Option<PricingInterval>,
    pub interval_count: Option<i64>,
    pub trial_period_days: Option<i64>,
}

/// The caller's active subscription with its catalog entries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSubscription {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub price: Option<Price>,
    pub product: Option<Product>,
}

/// Split a product description into feature bullet points
pub fn parse_features(description: Option<&str>) -> Vec<String> {
    description
        .unwrap_or_default()
        .split(['、', ','])
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct CatalogService {
    store: Arc<dyn BillingStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Active prices ascending by unit amount, joined with their product.
    /// Prices whose product has not been mirrored yet are left out.
    pub async fn pricing_plans(&self) -> BillingResult<Vec<PricingPlan>> {
        let prices = self.store.list_active_prices().await?;
        let mut plans = Vec::with_capacity(prices.len());

        for price in prices {
            let Some(product) = self.store.find_product(&price.product_id).await? else {
                tracing::debug!(
                    price_id = %price.id,
                    product_id = %price.product_id,
                    "Skipping price without mirrored product"
                );
                continue;
            };

            plans.push(PricingPlan {
                features: parse_features(product.description.as_deref()),
                price_id: price.id,
                product_id: product.id,
                name: product.name,
                description: product.description,
                unit_amount: price.unit_amount,
                currency: price.currency,
                price_type: price.price_type,
                interval: price.interval,
                interval_count: price.interval_count,
                trial_period_days: price.trial_period_days,
            });
        }

        Ok(plans)
    }

    pub async fn dashboard(&self, user_id: &str) -> BillingResult<Option<DashboardSubscription>> {
        let Some(subscription) = self.store.find_active_subscription(user_id).await? else {
            return Ok(None);
        };

        let price = match subscription.record.price_id.as_deref() {
            Some(price_id) => self.store.find_price(price_id).await?,
            None => None,
        };
        let product = match price.as_ref() {
            Some(price) => self.store.find_product(&price.product_id).await?,
            None => None,
        };

        Ok(Some(DashboardSubscription {
            subscription,
            price,
            product,
        }))
    }
}
