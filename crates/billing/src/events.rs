//! Typed Stripe webhook events
//!
//! Deliveries are parsed into local types rather than `stripe::Event` so that
//! payloads from newer API versions still deserialize. Only the fields the
//! mirror tables need are read; everything else is ignored.

use plansync_shared::{
    Metadata, Price, PriceType, PricingInterval, Product, SubscriptionRecord, SubscriptionStatus,
};
use serde::Deserialize;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};

/// A reference that may arrive either as a bare id or as an expanded object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpandableId {
    Id(String),
    Object { id: String },
}

impl ExpandableId {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItemPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItemPayload {
    pub price: Option<ExpandableId>,
    pub quantity: Option<i64>,
    // Newer API versions carry the period bounds on the item only
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

/// `data.object` of a `customer.subscription.*` event
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPayload {
    pub id: String,
    pub customer: ExpandableId,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub created: i64,
    pub ended_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
}

impl SubscriptionPayload {
    fn first_item(&self) -> Option<&SubscriptionItemPayload> {
        self.items.data.first()
    }

    /// Build the full mirror record for the resolved owner
    pub fn to_record(&self, user_id: &str) -> BillingResult<SubscriptionRecord> {
        let item = self.first_item();
        let period_start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start));
        let period_end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end));

        Ok(SubscriptionRecord {
            user_id: user_id.to_string(),
            stripe_subscription_id: self.id.clone(),
            status: self.status,
            price_id: item
                .and_then(|i| i.price.as_ref())
                .map(|p| p.id().to_string()),
            quantity: item.and_then(|i| i.quantity),
            cancel_at_period_end: self.cancel_at_period_end,
            cancel_at: optional_timestamp(self.cancel_at)?,
            canceled_at: optional_timestamp(self.canceled_at)?,
            current_period_start: optional_timestamp(period_start)?,
            current_period_end: optional_timestamp(period_end)?,
            created_at: timestamp(self.created)?,
            ended_at: optional_timestamp(self.ended_at)?,
            trial_start: optional_timestamp(self.trial_start)?,
            trial_end: optional_timestamp(self.trial_end)?,
        })
    }

    pub fn ended_at(&self) -> BillingResult<Option<OffsetDateTime>> {
        optional_timestamp(self.ended_at)
    }
}

/// `data.object` of a `product.*` event
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPayload {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ProductPayload {
    pub fn to_row(&self) -> Product {
        Product {
            id: self.id.clone(),
            active: self.active,
            name: self.name.clone(),
            description: non_empty(self.description.as_deref()),
            image: non_empty(self.images.first().map(String::as_str)),
            metadata: Json(self.metadata.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringPayload {
    pub interval: PricingInterval,
    pub interval_count: Option<i64>,
    pub trial_period_days: Option<i64>,
}

/// `data.object` of a `price.*` event
#[derive(Debug, Clone, Deserialize)]
pub struct PricePayload {
    pub id: String,
    pub product: ExpandableId,
    #[serde(default)]
    pub active: bool,
    pub nickname: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(rename = "type")]
    pub price_type: PriceType,
    pub recurring: Option<RecurringPayload>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PricePayload {
    pub fn to_row(&self) -> Price {
        let recurring = self.recurring.as_ref();
        Price {
            id: self.id.clone(),
            product_id: self.product.id().to_string(),
            active: self.active,
            description: non_empty(self.nickname.as_deref()),
            unit_amount: self.unit_amount.unwrap_or(0),
            currency: self.currency.clone(),
            price_type: self.price_type,
            interval: recurring.map(|r| r.interval),
            interval_count: recurring.and_then(|r| r.interval_count),
            trial_period_days: recurring.and_then(|r| r.trial_period_days),
            metadata: Json(self.metadata.clone()),
        }
    }
}

/// Which lifecycle step a subscription event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    Created,
    Updated,
}

/// Classified event body
#[derive(Debug, Clone)]
pub enum BillingEvent {
    SubscriptionChanged(SubscriptionChange, SubscriptionPayload),
    SubscriptionDeleted(SubscriptionPayload),
    ProductChanged(ProductPayload),
    PriceChanged(PricePayload),
    /// Acknowledged without any state change
    Unhandled,
}

/// A verified delivery: envelope fields plus the classified body
#[derive(Debug, Clone)]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    pub event: BillingEvent,
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

impl StripeEvent {
    /// Parse and classify a raw delivery body
    pub fn parse(payload: &str) -> BillingResult<Self> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        let object = envelope.data.object;

        let event = match envelope.event_type.as_str() {
            "customer.subscription.created" => BillingEvent::SubscriptionChanged(
                SubscriptionChange::Created,
                serde_json::from_value(object)?,
            ),
            "customer.subscription.updated" => BillingEvent::SubscriptionChanged(
                SubscriptionChange::Updated,
                serde_json::from_value(object)?,
            ),
            "customer.subscription.deleted" => {
                BillingEvent::SubscriptionDeleted(serde_json::from_value(object)?)
            }
            "product.created" | "product.updated" => {
                BillingEvent::ProductChanged(serde_json::from_value(object)?)
            }
            "price.created" | "price.updated" => {
                BillingEvent::PriceChanged(serde_json::from_value(object)?)
            }
            _ => BillingEvent::Unhandled,
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            event,
        })
    }
}

fn timestamp(secs: i64) -> BillingResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| BillingError::InvalidPayload(format!("timestamp {}: {}", secs, e)))
}

fn optional_timestamp(secs: Option<i64>) -> BillingResult<Option<OffsetDateTime>> {
    secs.map(timestamp).transpose()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
