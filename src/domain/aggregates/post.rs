//! Feed posts and comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub uid: String,
    pub user_id: i64,
    pub post_type: String,
    pub media_url: String,
    pub caption: Option<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post joined with its author and the viewer's like, as the feed queries return it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedRow {
    #[sqlx(flatten)]
    pub post: Post,
    pub author_uid: String,
    pub author_username: String,
    pub author_display_name: String,
    pub author_profile_image_url: Option<String>,
    pub author_is_verified: bool,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub user_profile_image: Option<String>,
    pub is_user_verified: bool,
    #[serde(rename = "type")]
    pub post_type: String,
    pub video_url: String,
    pub caption: Option<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub shares_count: i32,
    pub views_count: i32,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeedRow> for PostView {
    fn from(r: FeedRow) -> Self {
        Self {
            id: r.post.uid, user_id: r.author_uid, username: r.author_username, display_name: r.author_display_name,
            user_profile_image: r.author_profile_image_url, is_user_verified: r.author_is_verified,
            post_type: r.post.post_type, video_url: r.post.media_url, caption: r.post.caption,
            likes_count: r.post.likes_count, comments_count: r.post.comments_count,
            // not tracked yet
            shares_count: 0, views_count: 0,
            is_liked: r.is_liked, created_at: r.post.created_at, updated_at: r.post.updated_at,
        }
    }
}

/// A comment joined with its author.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_uid: String,
    pub author_username: String,
    pub author_display_name: String,
    pub author_profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub user_profile_image: Option<String>,
    pub post_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(row: CommentRow, post_uid: &str) -> Self {
        Self {
            id: row.id, user_id: row.author_uid, username: row.author_username, display_name: row.author_display_name,
            user_profile_image: row.author_profile_image_url, post_id: post_uid.to_string(), content: row.content,
            created_at: row.created_at, updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_view_mapping() {
        let now = Utc::now();
        let row = FeedRow {
            post: Post {
                id: 1, uid: "post-1".into(), user_id: 3, post_type: "reel".into(), media_url: "https://cdn/x.mp4".into(),
                caption: Some("hi".into()), likes_count: 4, comments_count: 2, created_at: now, updated_at: now,
            },
            author_uid: "U3".into(), author_username: "u3".into(), author_display_name: "U Three".into(),
            author_profile_image_url: None, author_is_verified: true, is_liked: true,
        };
        let v = serde_json::to_value(PostView::from(row)).unwrap();
        assert_eq!(v["id"], "post-1");
        assert_eq!(v["user_id"], "U3");
        assert_eq!(v["type"], "reel");
        assert_eq!(v["video_url"], "https://cdn/x.mp4");
        assert_eq!(v["is_liked"], true);
        assert_eq!(v["shares_count"], 0);
    }
}
