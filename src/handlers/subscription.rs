//! Subscription ledger handlers: create, upgrade (with proration), cancel,
//! and list.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::dtos::{
    CancelSubscriptionRequest, CreateSubscriptionRequest, ListSubscriptionsQuery,
    UpgradeSubscriptionRequest,
};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{
    IntervalKind, ListSubscriptionsFilter, NewSubscription, SubscriptionResponse,
    SubscriptionStatus,
};
use crate::services::proration::{period_end, prorated_amount, ProrationError};
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn create_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let price = state
        .db
        .resolve_price(req.price_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("the price id was not found")))?;

    if state
        .db
        .find_active_subscription_for_plan(user_id, price.plan_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "You have an active subscription with this plan"
        )));
    }

    let kind = parse_stored_interval(&price.interval)?;
    let period_start = Utc::now();
    let period_end = period_end(period_start, kind, price.interval_count)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let subscription = state
        .db
        .create_subscription(&NewSubscription {
            user_id,
            plan_id: price.plan_id,
            price_id: price.price_id,
            interval: price.interval.clone(),
            current_period_start: period_start,
            current_period_end: period_end,
            status: SubscriptionStatus::Active,
            amount_paid: price.amount,
            upgraded_from_subscription_id: None,
        })
        .await?;

    tracing::info!(
        subscription_id = %subscription.id,
        user_id = %user_id,
        plan_id = %price.plan_id,
        "Subscription created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Subscription created",
            "data": SubscriptionResponse::from(subscription),
        })),
    ))
}

pub async fn upgrade_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<UpgradeSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let existing = state
        .db
        .find_subscription(
            user_id,
            req.subscription_id,
            Some(SubscriptionStatus::Active),
        )
        .await?
        .ok_or_else(|| {
            AppError::InvalidOperation(anyhow::anyhow!("the subscription was not found"))
        })?;

    if existing.upgraded_from_subscription_id.is_some() {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You have already upgraded this subscription"
        )));
    }

    if existing.interval == IntervalKind::OneTime.as_str() {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You cannot upgrade a one-time subscription"
        )));
    }

    let new_price = state
        .db
        .resolve_price(req.new_price_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("the price id was not found")))?;

    if new_price.plan_id == existing.plan_id {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You are already subscribed to this plan"
        )));
    }

    if existing.interval != new_price.interval {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You cannot upgrade between different billing intervals"
        )));
    }

    if !state
        .db
        .is_upgrade_allowed(existing.plan_id, new_price.plan_id)
        .await?
    {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You cannot upgrade between these plans"
        )));
    }

    if new_price.amount < existing.amount_paid {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "You cannot downgrade to a cheaper plan"
        )));
    }

    let now = Utc::now();

    // Time-weighted cost transfer: credit the unused whole days of the old
    // period against the new price. The result may be negative and is
    // recorded as-is.
    let new_amount_paid = prorated_amount(
        existing.current_period_start,
        existing.current_period_end,
        now,
        existing.amount_paid,
        new_price.amount,
    )
    .map_err(|e| match e {
        ProrationError::PeriodEnded => AppError::InvalidOperation(anyhow::anyhow!(
            "You cannot upgrade a subscription that has already ended"
        )),
        ProrationError::EmptyPeriod => AppError::InvalidOperation(anyhow::anyhow!(
            "the subscription period spans less than one whole day"
        )),
        ProrationError::PeriodOutOfRange => AppError::Internal(anyhow::anyhow!(e)),
    })?;

    let kind = parse_stored_interval(&new_price.interval)?;
    let new_period_end = period_end(now, kind, new_price.interval_count)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let subscription = state
        .db
        .upgrade_subscription(
            &NewSubscription {
                user_id,
                plan_id: new_price.plan_id,
                price_id: new_price.price_id,
                interval: new_price.interval.clone(),
                current_period_start: now,
                current_period_end: new_period_end,
                status: SubscriptionStatus::Active,
                amount_paid: new_amount_paid,
                upgraded_from_subscription_id: Some(existing.id),
            },
            existing.id,
            now,
        )
        .await?;

    tracing::info!(
        subscription_id = %subscription.id,
        upgraded_from = %existing.id,
        user_id = %user_id,
        amount_paid = new_amount_paid,
        "Subscription upgraded"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Successfully upgraded subscription",
            "subscription": SubscriptionResponse::from(subscription),
        })),
    ))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CancelSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let existing = state
        .db
        .find_subscription(user_id, req.subscription_id, None)
        .await?
        .ok_or_else(|| {
            AppError::InvalidOperation(anyhow::anyhow!("the subscription is not currently active"))
        })?;

    if existing.canceled_at.is_some() || existing.ended_at.is_some() {
        return Err(AppError::InvalidOperation(anyhow::anyhow!(
            "the subscription is not currently active"
        )));
    }

    let subscription = state
        .db
        .cancel_subscription(existing.id, Utc::now())
        .await?;

    tracing::info!(subscription_id = %subscription.id, user_id = %user_id, "Subscription canceled");

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Successfully canceled subscription",
            "subscription": SubscriptionResponse::from(subscription),
        })),
    ))
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListSubscriptionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let subscriptions = state
        .db
        .list_subscriptions(
            user_id,
            &ListSubscriptionsFilter {
                status: query.status,
                plan_id: query.plan_id,
            },
        )
        .await?;

    let subscriptions: Vec<SubscriptionResponse> = subscriptions
        .into_iter()
        .map(SubscriptionResponse::from)
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Successfully retrieved subscription",
            "subscriptions": subscriptions,
        })),
    ))
}

/// Interval kinds are validated on write; an unknown stored value means a
/// corrupt row.
fn parse_stored_interval(interval: &str) -> Result<IntervalKind, AppError> {
    IntervalKind::parse(interval).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown interval kind stored in catalog: {}",
            interval
        ))
    })
}
