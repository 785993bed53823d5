use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{self, CurrentUser};
use crate::db::models::{UserRecord, UserRole};
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserRecord,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRecord>)> {
    // mentors are onboarded manually, admins never self-register
    if !matches!(req.role, UserRole::Backer | UserRole::Entrepreneur) {
        return Err(AppError::Validation(
            "Role must be backer or entrepreneur".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name must not be empty".to_string()));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .users
        .create(req.email.trim(), &password_hash, full_name, req.role)
        .await?;

    tracing::info!("New user registered: {} ({:?})", user.email, user.role);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let user = state
        .users
        .find_by_email(req.email.trim())
        .await?
        .filter(|user| auth::verify_password(&req.password, &user.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Incorrect email or password".to_string()))?;
    let user = auth::ensure_active(user)?;

    tracing::info!("User logged in: {} ({:?})", user.email, user.role);
    token_response(&state, user)
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let claims = auth::verify_token(&req.refresh_token, &state.config.jwt_secret)?;
    if claims.typ != "refresh" {
        return Err(AppError::Unauthorized("Expected a refresh token".to_string()));
    }

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;
    let user = auth::ensure_active(user)?;

    token_response(&state, user)
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserRecord> {
    Json(user)
}

fn token_response(state: &AppState, user: UserRecord) -> Result<Json<TokenResponse>> {
    let config = &state.config;
    let access_token =
        auth::create_access_token(&user, &config.jwt_secret, config.access_token_expire_minutes)?;
    let refresh_token =
        auth::create_refresh_token(&user, &config.jwt_secret, config.refresh_token_expire_days)?;

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
        expires_in: config.access_token_expire_minutes * 60,
        user,
    }))
}
