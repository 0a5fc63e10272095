//! Subscription model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription status.
///
/// Cancellation does not move a subscription out of `Active`; it only stamps
/// `canceled_at`. Only a superseding upgrade flips the status to `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Ended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "ended" => Some(SubscriptionStatus::Ended),
            _ => None,
        }
    }
}

/// Subscription entity.
///
/// `interval` is a denormalized copy of the interval kind chosen at creation
/// time and never changes afterwards.
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub price_id: Uuid,
    pub interval: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub status: String,
    pub amount_paid: i64,
    pub upgraded_from_subscription_id: Option<Uuid>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub price_id: Uuid,
    pub interval: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub amount_paid: i64,
    pub upgraded_from_subscription_id: Option<Uuid>,
}

/// Optional filters for listing a user's subscriptions.
#[derive(Debug, Clone, Default)]
pub struct ListSubscriptionsFilter {
    pub status: Option<String>,
    pub plan_id: Option<Uuid>,
}

/// Subscription representation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub price_id: Uuid,
    pub interval: String,
    #[serde(with = "super::timestamp_format")]
    pub current_period_start: DateTime<Utc>,
    #[serde(with = "super::timestamp_format")]
    pub current_period_end: DateTime<Utc>,
    pub status: String,
    pub amount_paid: i64,
    pub upgraded_from_subscription_id: Option<Uuid>,
    #[serde(with = "super::timestamp_format_option")]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(with = "super::timestamp_format_option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(with = "super::timestamp_format")]
    pub created_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            plan_id: s.plan_id,
            price_id: s.price_id,
            interval: s.interval,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            status: s.status,
            amount_paid: s.amount_paid,
            upgraded_from_subscription_id: s.upgraded_from_subscription_id,
            canceled_at: s.canceled_at,
            ended_at: s.ended_at,
            created_at: s.created_at,
        }
    }
}
