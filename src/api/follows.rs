//! Follow graph. Counters move in the same transaction as the edge row.

use axum::{extract::{Path, Query, State}, Json};
use serde_json::{json, Value};

use super::users::find_by_uid;
use super::{AppState, ListParams};
use crate::auth::AuthUser;
use crate::{BuyvError, Result};

pub async fn follow(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let target = find_by_uid(&s.db, &uid).await?;
    if target.id == me.id { return Err(BuyvError::Validation("Cannot follow yourself".into())); }

    let mut tx = s.db.begin().await?;
    let inserted = sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(me.id).bind(target.id).execute(&mut *tx).await?.rows_affected();
    if inserted == 0 { return Ok(Json(json!({"status": "already_following"}))); }
    sqlx::query("UPDATE users SET following_count = following_count + 1 WHERE id = $1").bind(me.id).execute(&mut *tx).await?;
    sqlx::query("UPDATE users SET followers_count = followers_count + 1 WHERE id = $1").bind(target.id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(json!({"status": "followed"})))
}

pub async fn unfollow(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let target = find_by_uid(&s.db, &uid).await?;
    if target.id == me.id { return Err(BuyvError::Validation("Cannot unfollow yourself".into())); }

    let mut tx = s.db.begin().await?;
    let deleted = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
        .bind(me.id).bind(target.id).execute(&mut *tx).await?.rows_affected();
    if deleted == 0 { return Ok(Json(json!({"status": "not_following"}))); }
    sqlx::query("UPDATE users SET following_count = GREATEST(following_count - 1, 0) WHERE id = $1").bind(me.id).execute(&mut *tx).await?;
    sqlx::query("UPDATE users SET followers_count = GREATEST(followers_count - 1, 0) WHERE id = $1").bind(target.id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(json!({"status": "unfollowed"})))
}

pub async fn is_following(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let target = find_by_uid(&s.db, &uid).await?;
    let (following,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)")
        .bind(me.id).bind(target.id).fetch_one(&s.db).await?;
    Ok(Json(json!({"isFollowing": following})))
}

pub async fn followers(State(s): State<AppState>, Path(uid): Path<String>) -> Result<Json<Value>> {
    let user = find_by_uid(&s.db, &uid).await?;
    let uids: Vec<String> = sqlx::query_scalar(
        "SELECT u.uid FROM follows f JOIN users u ON u.id = f.follower_id WHERE f.followed_id = $1 ORDER BY f.created_at DESC")
        .bind(user.id).fetch_all(&s.db).await?;
    Ok(Json(json!({"followers": uids})))
}

pub async fn following(State(s): State<AppState>, Path(uid): Path<String>) -> Result<Json<Value>> {
    let user = find_by_uid(&s.db, &uid).await?;
    let uids: Vec<String> = sqlx::query_scalar(
        "SELECT u.uid FROM follows f JOIN users u ON u.id = f.followed_id WHERE f.follower_id = $1 ORDER BY f.created_at DESC")
        .bind(user.id).fetch_all(&s.db).await?;
    Ok(Json(json!({"following": uids})))
}

/// Counted from the edge rows rather than the cached counters.
pub async fn counts(State(s): State<AppState>, Path(uid): Path<String>) -> Result<Json<Value>> {
    let user = find_by_uid(&s.db, &uid).await?;
    let (followers, following): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM follows WHERE followed_id = $1), (SELECT COUNT(*) FROM follows WHERE follower_id = $1)")
        .bind(user.id).fetch_one(&s.db).await?;
    Ok(Json(json!({"followers": followers, "following": following})))
}

pub async fn suggested(State(s): State<AppState>, AuthUser(me): AuthUser, Query(p): Query<ListParams>) -> Result<Json<Value>> {
    let uids: Vec<String> = sqlx::query_scalar(
        "SELECT uid FROM users WHERE id <> $1 AND id NOT IN (SELECT followed_id FROM follows WHERE follower_id = $1) \
         ORDER BY followers_count DESC, created_at DESC LIMIT $2")
        .bind(me.id).bind(p.page().limit).fetch_all(&s.db).await?;
    Ok(Json(json!({"suggested": uids})))
}
