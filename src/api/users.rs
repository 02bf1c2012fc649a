use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use validator::Validate;

use super::AppState;
use crate::auth::AuthUser;
use crate::domain::aggregates::{User, UserProfile};
use crate::domain::value_objects::Page;
use crate::{BuyvError, Result};

#[derive(Debug, Deserialize)]
pub struct SearchParams { pub q: String, pub limit: Option<i64>, pub offset: Option<i64> }

pub async fn search(State(s): State<AppState>, Query(p): Query<SearchParams>) -> Result<Json<Vec<UserProfile>>> {
    let q = p.q.trim();
    if q.is_empty() { return Err(BuyvError::Validation("Search query must not be empty".into())); }
    let page = Page::new(p.limit, p.offset);
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE username ILIKE $1 OR display_name ILIKE $1 ORDER BY id LIMIT $2 OFFSET $3")
        .bind(format!("%{}%", q)).bind(page.limit).bind(page.offset).fetch_all(&s.db).await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

pub(crate) async fn find_by_uid(db: &sqlx::PgPool, uid: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE uid = $1")
        .bind(uid).fetch_optional(db).await?.ok_or(BuyvError::NotFound("User"))
}

pub async fn get_user(State(s): State<AppState>, Path(uid): Path<String>) -> Result<Json<UserProfile>> {
    Ok(Json((&find_by_uid(&s.db, &uid).await?).into()))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    pub profile_image_url: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub settings: Option<serde_json::Value>,
}

/// Partial update; absent fields are left as they are.
pub async fn update_user(State(s): State<AppState>, AuthUser(caller): AuthUser, Path(uid): Path<String>, Json(r): Json<UpdateUserRequest>) -> Result<Json<UserProfile>> {
    r.validate()?;
    let target = find_by_uid(&s.db, &uid).await?;
    if target.id != caller.id { return Err(BuyvError::Forbidden("Cannot modify another user's profile")); }
    let interests = r.interests.map(|i| serde_json::json!(i));
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET display_name = COALESCE($2, display_name), profile_image_url = COALESCE($3, profile_image_url), \
         bio = COALESCE($4, bio), interests = COALESCE($5, interests), settings = COALESCE($6, settings), updated_at = NOW() \
         WHERE id = $1 RETURNING *")
        .bind(target.id).bind(&r.display_name).bind(&r.profile_image_url).bind(&r.bio).bind(&interests).bind(&r.settings)
        .fetch_one(&s.db).await?;
    Ok(Json((&user).into()))
}
