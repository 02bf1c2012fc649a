use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use validator::Validate;

use super::{AppState, ListParams};
use crate::auth::AuthUser;
use crate::domain::aggregates::{CommentRow, CommentView};
use crate::{BuyvError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "comment must be 1-2000 characters"))]
    pub content: String,
}

async fn post_id(db: &sqlx::PgPool, post_uid: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE uid = $1")
        .bind(post_uid).fetch_optional(db).await?.ok_or(BuyvError::NotFound("Post"))
}

pub async fn create(State(s): State<AppState>, AuthUser(me): AuthUser, Path(post_uid): Path<String>, Json(r): Json<CreateCommentRequest>) -> Result<Json<CommentView>> {
    r.validate()?;
    let post_id = post_id(&s.db, &post_uid).await?;

    let mut tx = s.db.begin().await?;
    let row = sqlx::query_as::<_, CommentRow>(
        "WITH c AS (INSERT INTO comments (user_id, post_id, content) VALUES ($1, $2, $3) RETURNING *) \
         SELECT c.id, c.content, c.created_at, c.updated_at, $4::text AS author_uid, $5::text AS author_username, \
         $6::text AS author_display_name, $7::text AS author_profile_image_url FROM c")
        .bind(me.id).bind(post_id).bind(&r.content)
        .bind(&me.uid).bind(&me.username).bind(&me.display_name).bind(&me.profile_image_url)
        .fetch_one(&mut *tx).await?;
    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = $1").bind(post_id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(CommentView::new(row, &post_uid)))
}

/// Newest first.
pub async fn list(State(s): State<AppState>, Path(post_uid): Path<String>, Query(p): Query<ListParams>) -> Result<Json<Vec<CommentView>>> {
    let post_id = post_id(&s.db, &post_uid).await?;
    let page = p.page();
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT c.id, c.content, c.created_at, c.updated_at, u.uid AS author_uid, u.username AS author_username, \
         u.display_name AS author_display_name, u.profile_image_url AS author_profile_image_url \
         FROM comments c JOIN users u ON u.id = c.user_id WHERE c.post_id = $1 \
         ORDER BY c.created_at DESC, c.id DESC LIMIT $2 OFFSET $3")
        .bind(post_id).bind(page.limit).bind(page.offset).fetch_all(&s.db).await?;
    Ok(Json(rows.into_iter().map(|r| CommentView::new(r, &post_uid)).collect()))
}
