//! Database service: connection pool plus all catalog, upgrade-graph, and
//! subscription-ledger queries.
//!
//! Every multi-row mutation (plan tree insert, upgrade pair) runs in a single
//! transaction; the partial unique index on active subscriptions backs the
//! one-active-per-plan invariant under concurrent requests.

use crate::error::AppError;
use crate::models::{
    ListSubscriptionsFilter, NewPlan, NewSubscription, NewUser, Plan, PlanCatalogRow,
    PlanTreeResponse, ResolvedPrice, Subscription, SubscriptionStatus, User,
};
use crate::models::plan::{IntervalTreeResponse, PriceResponse};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations complete");
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert a new user. A concurrent duplicate email surfaces as Conflict.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn insert_user(&self, input: &NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, first_name, last_name, email, password, created_at, updated_at, last_login
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "User with this email already exists"))
    }

    #[instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password, created_at, updated_at, last_login
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to find user: {}", e)))
    }

    /// Stamp the user's last successful login time.
    #[instrument(skip(self))]
    pub async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $2, updated_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to record login: {}", e)))?;
        Ok(())
    }

    // ==================== Plan Catalog ====================

    #[instrument(skip(self))]
    pub async fn find_active_plan_by_name(&self, name: &str) -> Result<Option<Plan>, AppError> {
        sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, name, description, is_active, created_at, updated_at
            FROM plans
            WHERE name = $1 AND is_active
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to find plan: {}", e)))
    }

    /// Persist a plan with its intervals and prices as one unit.
    ///
    /// Either the whole tree commits or nothing does. Currency codes are
    /// stored uppercase.
    #[instrument(skip(self, input), fields(plan_name = %input.name))]
    pub async fn create_plan_tree(&self, input: &NewPlan) -> Result<PlanTreeResponse, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        let plan = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                &format!("Plan with the name {} already exists", input.name),
            )
        })?;

        let mut intervals = Vec::with_capacity(input.intervals.len());
        for interval_input in &input.intervals {
            let interval_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO plan_intervals (id, plan_id, interval, interval_count)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(plan.id)
            .bind(interval_input.interval.as_str())
            .bind(interval_input.interval_count)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to insert interval: {}", e)))?;

            let mut prices = Vec::with_capacity(interval_input.prices.len());
            for price_input in &interval_input.prices {
                let price_id: Uuid = sqlx::query_scalar(
                    r#"
                    INSERT INTO plan_interval_prices (id, interval_id, currency, amount)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(interval_id)
                .bind(price_input.currency.to_uppercase())
                .bind(price_input.amount)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::Database(anyhow::anyhow!("Failed to insert price: {}", e))
                })?;

                prices.push(PriceResponse {
                    id: price_id,
                    currency: price_input.currency.to_uppercase(),
                    amount: price_input.amount,
                });
            }

            intervals.push(IntervalTreeResponse {
                id: interval_id,
                interval: interval_input.interval.as_str().to_string(),
                interval_count: interval_input.interval_count,
                prices,
            });
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        Ok(PlanTreeResponse {
            id: plan.id,
            name: plan.name,
            description: plan.description,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
            intervals,
        })
    }

    /// Flat catalog listing: active plans joined to their active intervals
    /// and active prices, optionally restricted to one currency. Rows come
    /// back ordered by plan creation time, then interval, then price.
    #[instrument(skip(self))]
    pub async fn list_active_plans(
        &self,
        currency: Option<&str>,
    ) -> Result<Vec<PlanCatalogRow>, AppError> {
        sqlx::query_as::<_, PlanCatalogRow>(
            r#"
            SELECT p.id AS plan_id, p.name AS plan_name, p.description AS plan_description,
                   p.created_at AS plan_created_at, p.updated_at AS plan_updated_at,
                   i.id AS interval_id, i.interval, i.interval_count,
                   pr.id AS price_id, pr.currency, pr.amount
            FROM plans p
            JOIN plan_intervals i ON i.plan_id = p.id
            JOIN plan_interval_prices pr ON pr.interval_id = i.id
            WHERE p.is_active
              AND i.is_active
              AND pr.is_active
              AND ($1::char(3) IS NULL OR pr.currency = $1)
            ORDER BY p.created_at, i.created_at, pr.created_at
            "#,
        )
        .bind(currency)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list plans: {}", e)))
    }

    /// Resolve a price id to its (plan, interval, price) triple. All three
    /// must be active.
    #[instrument(skip(self))]
    pub async fn resolve_price(&self, price_id: Uuid) -> Result<Option<ResolvedPrice>, AppError> {
        sqlx::query_as::<_, ResolvedPrice>(
            r#"
            SELECT p.id AS plan_id, i.id AS interval_id, i.interval, i.interval_count,
                   pr.id AS price_id, pr.currency, pr.amount
            FROM plan_interval_prices pr
            JOIN plan_intervals i ON pr.interval_id = i.id
            JOIN plans p ON i.plan_id = p.id
            WHERE pr.id = $1 AND pr.is_active AND i.is_active AND p.is_active
            "#,
        )
        .bind(price_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to resolve price: {}", e)))
    }

    // ==================== Plan Upgrade Graph ====================

    /// True only if an active edge exists with this exact direction.
    #[instrument(skip(self))]
    pub async fn is_upgrade_allowed(
        &self,
        old_plan_id: Uuid,
        new_plan_id: Uuid,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM plan_upgrades
                WHERE old_plan_id = $1 AND new_plan_id = $2 AND is_active
            )
            "#,
        )
        .bind(old_plan_id)
        .bind(new_plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to check upgrade edge: {}", e)))
    }

    /// Declare that subscribers on `old_plan_id` may upgrade to `new_plan_id`.
    #[instrument(skip(self))]
    pub async fn insert_plan_upgrade(
        &self,
        old_plan_id: Uuid,
        new_plan_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO plan_upgrades (id, old_plan_id, new_plan_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(old_plan_id)
        .bind(new_plan_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "This upgrade path already exists"))?;
        Ok(())
    }

    // ==================== Subscription Ledger ====================

    /// Find the user's active subscription on a plan, if any.
    #[instrument(skip(self))]
    pub async fn find_active_subscription_for_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, plan_id, price_id, interval, current_period_start,
                   current_period_end, status, amount_paid, upgraded_from_subscription_id,
                   canceled_at, ended_at, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1 AND plan_id = $2 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to find subscription: {}", e)))
    }

    /// Load a subscription owned by the user, optionally restricted to a
    /// status.
    #[instrument(skip(self))]
    pub async fn find_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
        status: Option<SubscriptionStatus>,
    ) -> Result<Option<Subscription>, AppError> {
        let status_str = status.map(|s| s.as_str().to_string());
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, plan_id, price_id, interval, current_period_start,
                   current_period_end, status, amount_paid, upgraded_from_subscription_id,
                   canceled_at, ended_at, created_at, updated_at
            FROM subscriptions
            WHERE id = $1 AND user_id = $2
              AND ($3::varchar IS NULL OR status = $3)
            "#,
        )
        .bind(subscription_id)
        .bind(user_id)
        .bind(status_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to find subscription: {}", e)))
    }

    /// Insert a subscription row. A concurrent create racing past the
    /// check-then-insert loses on the partial unique index and surfaces as
    /// Conflict.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, plan_id = %input.plan_id))]
    pub async fn create_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<Subscription, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        let subscription = insert_subscription(&mut tx, input).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        Ok(subscription)
    }

    /// Atomically create the upgraded subscription and close the one it
    /// supersedes. Both writes commit together or neither does.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, old_subscription_id = %old_subscription_id))]
    pub async fn upgrade_subscription(
        &self,
        input: &NewSubscription,
        old_subscription_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        // The close only matches a still-active row; a concurrent upgrade of
        // the same subscription loses here and rolls back.
        let closed = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'ended', ended_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(old_subscription_id)
        .bind(ended_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to close subscription: {}", e)))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::InvalidOperation(anyhow::anyhow!(
                "the subscription was not found"
            )));
        }

        let subscription = insert_subscription(&mut tx, input).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        Ok(subscription)
    }

    /// Stamp `canceled_at`. The status stays "active"; cancellation is
    /// signaled purely via the timestamp.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        subscription_id: Uuid,
        canceled_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET canceled_at = $2, updated_at = $2
            WHERE id = $1
            RETURNING id, user_id, plan_id, price_id, interval, current_period_start,
                      current_period_end, status, amount_paid, upgraded_from_subscription_id,
                      canceled_at, ended_at, created_at, updated_at
            "#,
        )
        .bind(subscription_id)
        .bind(canceled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to cancel subscription: {}", e)))
    }

    /// List the user's subscriptions, optionally filtered by status and plan.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn list_subscriptions(
        &self,
        user_id: Uuid,
        filter: &ListSubscriptionsFilter,
    ) -> Result<Vec<Subscription>, AppError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, plan_id, price_id, interval, current_period_start,
                   current_period_end, status, amount_paid, upgraded_from_subscription_id,
                   canceled_at, ended_at, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR plan_id = $3)
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .bind(&filter.status)
        .bind(filter.plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list subscriptions: {}", e)))
    }
}

/// Insert a subscription row inside an open transaction.
async fn insert_subscription(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    input: &NewSubscription,
) -> Result<Subscription, AppError> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (id, user_id, plan_id, price_id, interval,
            current_period_start, current_period_end, status, amount_paid,
            upgraded_from_subscription_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, user_id, plan_id, price_id, interval, current_period_start,
                  current_period_end, status, amount_paid, upgraded_from_subscription_id,
                  canceled_at, ended_at, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.user_id)
    .bind(input.plan_id)
    .bind(input.price_id)
    .bind(&input.interval)
    .bind(input.current_period_start)
    .bind(input.current_period_end)
    .bind(input.status.as_str())
    .bind(input.amount_paid)
    .bind(input.upgraded_from_subscription_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_unique_violation(e, "You have an active subscription with this plan"))
}

/// Translate a unique-constraint violation into a Conflict with the given
/// message; everything else stays a database error.
fn map_unique_violation(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}", message))
        }
        _ => AppError::Database(anyhow::anyhow!(e)),
    }
}
