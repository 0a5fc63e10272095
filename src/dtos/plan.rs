use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

use crate::models::IntervalKind;

/// Create-plan payload: the whole plan tree arrives in one request.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_intervals"))]
pub struct CreatePlanRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,

    #[validate(length(min = 3, message = "Description must be at least 3 characters"))]
    pub description: String,

    #[validate(length(min = 1, message = "At least one interval is required"), nested)]
    pub intervals: Vec<PlanIntervalRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_prices"))]
pub struct PlanIntervalRequest {
    #[validate(custom(function = "validate_interval_kind"))]
    pub interval: String,

    #[validate(range(min = 0, message = "Interval count cannot be negative"))]
    pub interval_count: i32,

    #[validate(length(min = 1, message = "At least one price is required"), nested)]
    pub prices: Vec<PlanPriceRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PlanPriceRequest {
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,

    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListPlansQuery {
    pub currency: Option<String>,
}

fn validate_interval_kind(interval: &str) -> Result<(), ValidationError> {
    if IntervalKind::parse(interval).is_none() {
        return Err(ValidationError::new("interval")
            .with_message(format!("Unknown interval: {}", interval).into()));
    }
    Ok(())
}

/// Interval kinds may not repeat within a plan, one_time intervals must have
/// a zero count, and recurring intervals must have a non-zero count.
fn validate_intervals(req: &CreatePlanRequest) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for interval in &req.intervals {
        if !seen.insert(interval.interval.as_str()) {
            return Err(ValidationError::new("interval").with_message(
                format!("Duplicate interval found: {}", interval.interval).into(),
            ));
        }

        if interval.interval == "one_time" && interval.interval_count != 0 {
            return Err(ValidationError::new("interval_count")
                .with_message("one_time plan must have an interval count of 0".into()));
        }

        if interval.interval != "one_time" && interval.interval_count == 0 {
            return Err(ValidationError::new("interval_count")
                .with_message("recurring plans must have an interval count of at least one".into()));
        }
    }
    Ok(())
}

/// A currency may appear at most once per interval. Comparison ignores case
/// since currencies are stored uppercase.
fn validate_prices(interval: &PlanIntervalRequest) -> Result<(), ValidationError> {
    let mut currencies = HashSet::new();
    for price in &interval.prices {
        if !currencies.insert(price.currency.to_uppercase()) {
            return Err(ValidationError::new("currency").with_message(
                format!(
                    "Duplicate currency found for the same plan pricing: {}",
                    price.currency
                )
                .into(),
            ));
        }
    }
    Ok(())
}
