//! Row types mirrored from the identity provider and the payment processor

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Free-form key/value metadata attached to processor objects
pub type Metadata = HashMap<String, String>;

// =============================================================================
// Profiles
// =============================================================================

/// Mirror of an identity-provider user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields replaced on a `user.updated` event
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Customers
// =============================================================================

/// Link between a local user and a payment-processor customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub user_id: String,
    pub stripe_customer_id: String,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Subscription status as reported by the payment processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    Canceled,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full subscription record as built from a processor event.
///
/// Every field is overwritten when a later event for the same
/// `stripe_subscription_id` arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    pub quantity: Option<i64>,
    pub cancel_at_period_end: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub cancel_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub canceled_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub current_period_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trial_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trial_end: Option<OffsetDateTime>,
}

/// Stored subscription row: the record plus its local id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: SubscriptionRecord,
}

// =============================================================================
// Catalog
// =============================================================================

/// Local mirror of a billing product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub active: bool,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub metadata: Json<Metadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    OneTime,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PricingInterval {
    Day,
    Week,
    Month,
    Year,
}

/// Local mirror of a billing price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Price {
    pub id: String,
    pub product_id: String,
    pub active: bool,
    pub description: Option<String>,
    pub unit_amount: i64,
    pub currency: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub price_type: PriceType,
    pub interval: Option<PricingInterval>,
    pub interval_count: Option<i64>,
    pub trial_period_days: Option<i64>,
    pub metadata: Json<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_serializes_flat_with_rfc3339_timestamps() {
        let created_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let subscription = Subscription {
            id: Uuid::nil(),
            record: SubscriptionRecord {
                user_id: "user_1".to_string(),
                stripe_subscription_id: "sub_1".to_string(),
                status: SubscriptionStatus::PastDue,
                price_id: Some("price_1".to_string()),
                quantity: Some(1),
                cancel_at_period_end: false,
                cancel_at: None,
                canceled_at: None,
                current_period_start: None,
                current_period_end: None,
                created_at,
                ended_at: None,
                trial_start: None,
                trial_end: None,
            },
        };

        let json = serde_json::to_value(&subscription).unwrap();
        assert_eq!(json["id"], Uuid::nil().to_string());
        assert_eq!(json["status"], "past_due");
        assert_eq!(json["created_at"], "2023-11-14T22:13:20Z");
        assert!(json["ended_at"].is_null());
        assert!(json.get("record").is_none(), "record must be flattened");
    }

    #[test]
    fn test_price_type_field_is_named_type() {
        let price = Price {
            id: "price_1".to_string(),
            product_id: "prod_1".to_string(),
            active: true,
            description: None,
            unit_amount: 1500,
            currency: "usd".to_string(),
            price_type: PriceType::OneTime,
            interval: None,
            interval_count: None,
            trial_period_days: None,
            metadata: Json(Metadata::new()),
        };

        let json = serde_json::to_value(&price).unwrap();
        assert_eq!(json["type"], "one_time");
        assert_eq!(json["metadata"], serde_json::json!({}));
    }

    #[test]
    fn test_status_display_matches_serde() {
        for status in [
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::IncompleteExpired,
            SubscriptionStatus::Paused,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.to_string());
        }
    }
}
