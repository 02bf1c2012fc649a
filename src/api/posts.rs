//! Posts, likes and bookmarks.

use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::users::find_by_uid;
use super::{AppState, ListParams};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::domain::aggregates::{FeedRow, Post, PostView};
use crate::domain::value_objects::{Page, PostType};
use crate::{BuyvError, Result};

/// `$1` is the viewer's id (or NULL) for the `is_liked` flag.
const FEED_SELECT: &str = "SELECT p.*, u.uid AS author_uid, u.username AS author_username, \
    u.display_name AS author_display_name, u.profile_image_url AS author_profile_image_url, \
    u.is_verified AS author_is_verified, \
    EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked \
    FROM posts p JOIN users u ON u.id = p.user_id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(rename = "type")]
    pub post_type: String,
    #[validate(length(min = 1, message = "media url is required"))]
    pub media_url: String,
    #[validate(length(max = 2200))]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserPostsParams {
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn viewer_id(viewer: &MaybeAuthUser) -> Option<i64> { viewer.0.as_ref().map(|u| u.id) }

fn views(rows: Vec<FeedRow>) -> Json<Vec<PostView>> { Json(rows.into_iter().map(PostView::from).collect()) }

async fn find_post(db: &sqlx::PgPool, uid: &str) -> Result<Post> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE uid = $1")
        .bind(uid).fetch_optional(db).await?.ok_or(BuyvError::NotFound("Post"))
}

async fn feed_row(db: &sqlx::PgPool, viewer: Option<i64>, post_id: i64) -> Result<FeedRow> {
    sqlx::query_as::<_, FeedRow>(&format!("{} WHERE p.id = $2", FEED_SELECT))
        .bind(viewer).bind(post_id).fetch_optional(db).await?.ok_or(BuyvError::NotFound("Post"))
}

pub async fn create(State(s): State<AppState>, AuthUser(me): AuthUser, Json(r): Json<CreatePostRequest>) -> Result<Json<PostView>> {
    r.validate()?;
    let post_type: PostType = r.post_type.parse().map_err(|_| BuyvError::Validation("Invalid post type".into()))?;
    let caption = r.caption.filter(|c| !c.trim().is_empty());

    let mut tx = s.db.begin().await?;
    let post = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (uid, user_id, post_type, media_url, caption) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(Uuid::now_v7().to_string()).bind(me.id).bind(post_type.as_str()).bind(&r.media_url).bind(&caption)
        .fetch_one(&mut *tx).await?;
    if post_type == PostType::Reel {
        sqlx::query("UPDATE users SET reels_count = reels_count + 1 WHERE id = $1").bind(me.id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(post = %post.uid, user = %me.uid, kind = %post_type, "post created");
    Ok(Json(feed_row(&s.db, Some(me.id), post.id).await?.into()))
}

pub async fn feed(State(s): State<AppState>, AuthUser(me): AuthUser, Query(p): Query<ListParams>) -> Result<Json<Vec<PostView>>> {
    let page = p.page();
    let rows = sqlx::query_as::<_, FeedRow>(&format!("{} ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3", FEED_SELECT))
        .bind(me.id).bind(page.limit).bind(page.offset).fetch_all(&s.db).await?;
    Ok(views(rows))
}

pub async fn search(State(s): State<AppState>, viewer: MaybeAuthUser, Query(p): Query<SearchParams>) -> Result<Json<Vec<PostView>>> {
    let q = p.q.trim();
    if q.is_empty() { return Err(BuyvError::Validation("Search query must not be empty".into())); }
    // unknown types are ignored rather than rejected
    let post_type = p.post_type.as_deref().and_then(|t| t.parse::<PostType>().ok()).map(|t| t.as_str());
    let page = Page::new(p.limit, p.offset);
    let rows = sqlx::query_as::<_, FeedRow>(&format!(
        "{} WHERE p.caption ILIKE $2 AND ($3::text IS NULL OR p.post_type = $3) ORDER BY p.created_at DESC, p.id DESC LIMIT $4 OFFSET $5",
        FEED_SELECT))
        .bind(viewer_id(&viewer)).bind(format!("%{}%", q)).bind(post_type).bind(page.limit).bind(page.offset)
        .fetch_all(&s.db).await?;
    Ok(views(rows))
}

pub async fn get_post(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<PostView>> {
    let post = find_post(&s.db, &uid).await?;
    Ok(Json(feed_row(&s.db, Some(me.id), post.id).await?.into()))
}

pub async fn delete(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    if post.user_id != me.id { return Err(BuyvError::Forbidden("Not allowed")); }

    let mut tx = s.db.begin().await?;
    sqlx::query("DELETE FROM posts WHERE id = $1").bind(post.id).execute(&mut *tx).await?;
    if post.post_type == PostType::Reel.as_str() {
        sqlx::query("UPDATE users SET reels_count = GREATEST(reels_count - 1, 0) WHERE id = $1").bind(me.id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(Json(json!({"status": "deleted"})))
}

pub async fn by_user(State(s): State<AppState>, viewer: MaybeAuthUser, Path(uid): Path<String>, Query(p): Query<UserPostsParams>) -> Result<Json<Vec<PostView>>> {
    let author = find_by_uid(&s.db, &uid).await?;
    let page = Page::new(p.limit, p.offset);
    let rows = sqlx::query_as::<_, FeedRow>(&format!(
        "{} WHERE p.user_id = $2 AND ($3::text IS NULL OR p.post_type = $3) ORDER BY p.created_at DESC, p.id DESC LIMIT $4 OFFSET $5",
        FEED_SELECT))
        .bind(viewer_id(&viewer)).bind(author.id).bind(p.post_type.as_deref()).bind(page.limit).bind(page.offset)
        .fetch_all(&s.db).await?;
    Ok(views(rows))
}

/// Posts `uid` has liked, most recently liked first. Always flagged liked.
pub async fn liked_by_user(State(s): State<AppState>, Path(uid): Path<String>, Query(p): Query<ListParams>) -> Result<Json<Vec<PostView>>> {
    let user = find_by_uid(&s.db, &uid).await?;
    let page = p.page();
    let rows = sqlx::query_as::<_, FeedRow>(&format!(
        "{} JOIN post_likes liked ON liked.post_id = p.id AND liked.user_id = $2 ORDER BY liked.created_at DESC LIMIT $3 OFFSET $4",
        FEED_SELECT))
        .bind(user.id).bind(user.id).bind(page.limit).bind(page.offset)
        .fetch_all(&s.db).await?;
    Ok(views(rows))
}

pub async fn count_for_user(State(s): State<AppState>, Path(uid): Path<String>, Query(p): Query<UserPostsParams>) -> Result<Json<Value>> {
    let user = find_by_uid(&s.db, &uid).await?;
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = $1 AND ($2::text IS NULL OR post_type = $2)")
        .bind(user.id).bind(p.post_type.as_deref()).fetch_one(&s.db).await?;
    Ok(Json(json!({"count": count})))
}

/// Inserts or deletes a like/bookmark edge, moving the like counter when
/// the edge actually changed.
async fn toggle(s: &AppState, table: Edge, user_id: i64, post_id: i64, on: bool) -> Result<bool> {
    let mut tx = s.db.begin().await?;
    let sql = match (table, on) {
        (Edge::Like, true) => "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        (Edge::Like, false) => "DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2",
        (Edge::Bookmark, true) => "INSERT INTO post_bookmarks (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        (Edge::Bookmark, false) => "DELETE FROM post_bookmarks WHERE post_id = $1 AND user_id = $2",
    };
    let changed = sqlx::query(sql).bind(post_id).bind(user_id).execute(&mut *tx).await?.rows_affected() > 0;
    if changed && table == Edge::Like {
        let counter = if on { "likes_count + 1" } else { "GREATEST(likes_count - 1, 0)" };
        sqlx::query(&format!("UPDATE posts SET likes_count = {} WHERE id = $1", counter)).bind(post_id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(changed)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edge { Like, Bookmark }

pub async fn like(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let status = if toggle(&s, Edge::Like, me.id, post.id, true).await? { "liked" } else { "already_liked" };
    Ok(Json(json!({"status": status})))
}

pub async fn unlike(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let status = if toggle(&s, Edge::Like, me.id, post.id, false).await? { "unliked" } else { "not_liked" };
    Ok(Json(json!({"status": status})))
}

pub async fn bookmark(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let status = if toggle(&s, Edge::Bookmark, me.id, post.id, true).await? { "bookmarked" } else { "already_bookmarked" };
    Ok(Json(json!({"status": status})))
}

pub async fn unbookmark(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let status = if toggle(&s, Edge::Bookmark, me.id, post.id, false).await? { "unbookmarked" } else { "not_bookmarked" };
    Ok(Json(json!({"status": status})))
}

pub async fn is_liked(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let (liked,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM post_likes WHERE post_id = $1 AND user_id = $2)")
        .bind(post.id).bind(me.id).fetch_one(&s.db).await?;
    Ok(Json(json!({"isLiked": liked})))
}

pub async fn is_bookmarked(State(s): State<AppState>, AuthUser(me): AuthUser, Path(uid): Path<String>) -> Result<Json<Value>> {
    let post = find_post(&s.db, &uid).await?;
    let (saved,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM post_bookmarks WHERE post_id = $1 AND user_id = $2)")
        .bind(post.id).bind(me.id).fetch_one(&s.db).await?;
    Ok(Json(json!({"isBookmarked": saved})))
}
