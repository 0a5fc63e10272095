//! Plan catalog models: plans, billing intervals, and per-currency prices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing cadence of a plan interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    OneTime,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalKind::OneTime => "one_time",
            IntervalKind::Day => "day",
            IntervalKind::Week => "week",
            IntervalKind::Month => "month",
            IntervalKind::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(IntervalKind::OneTime),
            "day" => Some(IntervalKind::Day),
            "week" => Some(IntervalKind::Week),
            "month" => Some(IntervalKind::Month),
            "year" => Some(IntervalKind::Year),
            _ => None,
        }
    }
}

/// Plan entity.
#[derive(Debug, Clone, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing interval owned by a plan.
#[derive(Debug, Clone, FromRow)]
pub struct PlanInterval {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub interval: String,
    pub interval_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Price for one currency within an interval.
#[derive(Debug, Clone, FromRow)]
pub struct PlanIntervalPrice {
    pub id: Uuid,
    pub interval_id: Uuid,
    pub currency: String,
    pub amount: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a plan together with its intervals and prices.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub intervals: Vec<NewPlanInterval>,
}

#[derive(Debug, Clone)]
pub struct NewPlanInterval {
    pub interval: IntervalKind,
    pub interval_count: i32,
    pub prices: Vec<NewPlanPrice>,
}

#[derive(Debug, Clone)]
pub struct NewPlanPrice {
    pub currency: String,
    pub amount: i64,
}

/// Flat row produced by the catalog listing join (plan x interval x price).
#[derive(Debug, Clone, FromRow)]
pub struct PlanCatalogRow {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub plan_description: String,
    pub plan_created_at: DateTime<Utc>,
    pub plan_updated_at: DateTime<Utc>,
    pub interval_id: Uuid,
    pub interval: String,
    pub interval_count: i32,
    pub price_id: Uuid,
    pub currency: String,
    pub amount: i64,
}

/// Result of resolving a price id to its active plan/interval/price triple.
#[derive(Debug, Clone, FromRow)]
pub struct ResolvedPrice {
    pub plan_id: Uuid,
    pub interval_id: Uuid,
    pub interval: String,
    pub interval_count: i32,
    pub price_id: Uuid,
    pub currency: String,
    pub amount: i64,
}

/// Plan tree for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTreeResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(with = "super::timestamp_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::timestamp_format")]
    pub updated_at: DateTime<Utc>,
    pub intervals: Vec<IntervalTreeResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalTreeResponse {
    pub id: Uuid,
    pub interval: String,
    pub interval_count: i32,
    pub prices: Vec<PriceResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub id: Uuid,
    pub currency: String,
    pub amount: i64,
}

/// Group the flat catalog rows back into plan trees.
///
/// Rows must already be ordered plan, interval, price; grouping preserves
/// that order, so plans come out in creation order.
pub fn group_plan_rows(rows: Vec<PlanCatalogRow>) -> Vec<PlanTreeResponse> {
    let mut plans: Vec<PlanTreeResponse> = Vec::new();

    for row in rows {
        if plans.last().map(|p| p.id) != Some(row.plan_id) {
            plans.push(PlanTreeResponse {
                id: row.plan_id,
                name: row.plan_name.clone(),
                description: row.plan_description.clone(),
                created_at: row.plan_created_at,
                updated_at: row.plan_updated_at,
                intervals: Vec::new(),
            });
        }

        if let Some(plan) = plans.last_mut() {
            if plan.intervals.last().map(|i| i.id) != Some(row.interval_id) {
                plan.intervals.push(IntervalTreeResponse {
                    id: row.interval_id,
                    interval: row.interval.clone(),
                    interval_count: row.interval_count,
                    prices: Vec::new(),
                });
            }
            if let Some(interval) = plan.intervals.last_mut() {
                interval.prices.push(PriceResponse {
                    id: row.price_id,
                    currency: row.currency,
                    amount: row.amount,
                });
            }
        }
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(plan_id: Uuid, interval_id: Uuid, currency: &str, amount: i64) -> PlanCatalogRow {
        PlanCatalogRow {
            plan_id,
            plan_name: "Plan".to_string(),
            plan_description: "A plan".to_string(),
            plan_created_at: Utc::now(),
            plan_updated_at: Utc::now(),
            interval_id,
            interval: "month".to_string(),
            interval_count: 1,
            price_id: Uuid::new_v4(),
            currency: currency.to_string(),
            amount,
        }
    }

    #[test]
    fn interval_kind_round_trips() {
        for kind in [
            IntervalKind::OneTime,
            IntervalKind::Day,
            IntervalKind::Week,
            IntervalKind::Month,
            IntervalKind::Year,
        ] {
            assert_eq!(IntervalKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(IntervalKind::parse("fortnight"), None);
    }

    #[test]
    fn groups_rows_into_nested_trees() {
        let plan_a = Uuid::new_v4();
        let plan_b = Uuid::new_v4();
        let interval_a1 = Uuid::new_v4();
        let interval_a2 = Uuid::new_v4();
        let interval_b1 = Uuid::new_v4();

        let rows = vec![
            row(plan_a, interval_a1, "USD", 1000),
            row(plan_a, interval_a1, "EUR", 900),
            row(plan_a, interval_a2, "USD", 10000),
            row(plan_b, interval_b1, "USD", 2000),
        ];

        let plans = group_plan_rows(rows);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].id, plan_a);
        assert_eq!(plans[0].intervals.len(), 2);
        assert_eq!(plans[0].intervals[0].prices.len(), 2);
        assert_eq!(plans[0].intervals[1].prices.len(), 1);
        assert_eq!(plans[1].id, plan_b);
        assert_eq!(plans[1].intervals[0].prices[0].amount, 2000);
    }

    #[test]
    fn grouping_empty_rows_yields_no_plans() {
        assert!(group_plan_rows(Vec::new()).is_empty());
    }
}
