pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::services::{Database, JwtService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub jwt: JwtService,
}

/// Service health check.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": state.config.service_name,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                })),
            )
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Everything under /plan and /subscription requires a bearer token.
    let protected = Router::new()
        .route(
            "/plan",
            post(handlers::plan::create_plan).get(handlers::plan::list_plans),
        )
        .route(
            "/subscription",
            post(handlers::subscription::create_subscription)
                .patch(handlers::subscription::cancel_subscription)
                .get(handlers::subscription::list_subscriptions),
        )
        .route(
            "/subscription_upgrade",
            patch(handlers::subscription::upgrade_subscription),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // tower-http panics if "*" is passed to `AllowOrigin::list`; the wildcard
    // must be expressed as `AllowOrigin::any()`.
    let allow_origin: AllowOrigin = if state
        .config
        .security
        .allowed_origins
        .iter()
        .any(|o| o == "*")
    {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(state.config.security.allowed_origins.iter().map(|o| {
            o.parse::<HeaderValue>().unwrap_or_else(|e| {
                tracing::error!("Invalid CORS origin '{}': {}. Using fallback.", o, e);
                HeaderValue::from_static("null")
            })
        }))
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .merge(protected)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(cors)
}
