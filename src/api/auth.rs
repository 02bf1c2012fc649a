use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::domain::aggregates::{User, UserProfile};
use crate::{unique_violation, BuyvError, Result};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "display name must be 1-100 characters"))]
    pub display_name: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest { pub email: String, pub password: String }

#[derive(Debug, Serialize)]
pub struct AuthResponse { pub access_token: String, pub token_type: &'static str, pub expires_in: i64, pub user: UserProfile }

fn respond(state: &AppState, user: &User) -> Result<Json<AuthResponse>> {
    let issued = state.tokens.issue(&user.uid)?;
    Ok(Json(AuthResponse { access_token: issued.access_token, token_type: "bearer", expires_in: issued.expires_in, user: user.into() }))
}

pub async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> Result<Json<AuthResponse>> {
    r.validate()?;
    let email = r.email.trim().to_lowercase();
    let (email_taken, username_taken): (bool, bool) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1), EXISTS(SELECT 1 FROM users WHERE username = $2)")
        .bind(&email).bind(&r.username).fetch_one(&s.db).await?;
    if email_taken { return Err(BuyvError::Validation("Email already registered".into())); }
    if username_taken { return Err(BuyvError::Validation("Username already taken".into())); }

    let password = r.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await
        .map_err(|e| BuyvError::Internal(e.to_string()))??;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (uid, email, username, display_name, password_hash) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(Uuid::now_v7().to_string()).bind(&email).bind(&r.username).bind(&r.display_name).bind(&hash)
        .fetch_one(&s.db).await
        .map_err(|e| match unique_violation(&e) {
            Some("users_email_key") => BuyvError::Validation("Email already registered".into()),
            Some("users_username_key") => BuyvError::Validation("Username already taken".into()),
            _ => BuyvError::Storage(e),
        })?;
    tracing::info!(uid = %user.uid, "user registered");
    respond(&s, &user)
}

pub async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> Result<Json<AuthResponse>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(r.email.trim().to_lowercase()).fetch_optional(&s.db).await?
        .ok_or(BuyvError::InvalidCredentials)?;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&r.password, &hash)).await
        .map_err(|e| BuyvError::Internal(e.to_string()))?;
    if !valid { return Err(BuyvError::InvalidCredentials); }
    respond(&s, &user)
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json((&user).into())
}
