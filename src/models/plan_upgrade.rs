//! Directed plan-upgrade edges.
//!
//! An edge (old_plan, new_plan) permits subscribers on `old_plan` to move to
//! `new_plan`. Edges are not symmetric; absence means the upgrade is
//! forbidden.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PlanUpgrade {
    pub id: Uuid,
    pub old_plan_id: Uuid,
    pub new_plan_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
