//! Plan catalog handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::dtos::{CreatePlanRequest, ListPlansQuery};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{group_plan_rows, IntervalKind, NewPlan, NewPlanInterval, NewPlanPrice};
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn create_plan(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = req.name.trim().to_string();

    if state.db.find_active_plan_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Plan with the name {} already exists",
            name
        )));
    }

    let mut intervals = Vec::with_capacity(req.intervals.len());
    for interval in &req.intervals {
        // Kinds were validated with the request payload.
        let kind = IntervalKind::parse(&interval.interval).ok_or_else(|| {
            AppError::Validation(anyhow::anyhow!("Unknown interval: {}", interval.interval))
        })?;
        intervals.push(NewPlanInterval {
            interval: kind,
            interval_count: interval.interval_count,
            prices: interval
                .prices
                .iter()
                .map(|p| NewPlanPrice {
                    currency: p.currency.clone(),
                    amount: p.amount,
                })
                .collect(),
        });
    }

    let plan = state
        .db
        .create_plan_tree(&NewPlan {
            name,
            description: req.description.trim().to_string(),
            intervals,
        })
        .await?;

    tracing::info!(plan_id = %plan.id, plan_name = %plan.name, "Plan created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Plan created",
            "data": plan,
        })),
    ))
}

pub async fn list_plans(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Query(query): Query<ListPlansQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .db
        .list_active_plans(query.currency.as_deref())
        .await?;
    let plans = group_plan_rows(rows);

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Successfully retrieved plans",
            "plans": plans,
        })),
    ))
}
