//! Registration and login.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::dtos::{LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::models::{NewUser, UserResponse};
use crate::utils::password::{hash_password, verify_password, Password, PasswordHashString};
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "User with this email already exists"
        )));
    }

    let password_hash = hash_password(&Password::new(req.password))?;

    let user = state
        .db
        .insert_user(&NewUser {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email,
            password: password_hash.into_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created",
            "data": UserResponse::from(user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();

    // Unknown email and bad password produce the same response.
    let user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    verify_password(
        &Password::new(req.password),
        &PasswordHashString::new(user.password.clone()),
    )
    .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    let token = state.jwt.generate_access_token(user.id, &user.email)?;
    state.db.record_login(user.id, Utc::now()).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "login successful",
            "token": token,
        })),
    ))
}
