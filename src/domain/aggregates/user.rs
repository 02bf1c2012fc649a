//! User accounts and their public profile shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub uid: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_image_url: Option<String>,
    pub bio: Option<String>,
    pub followers_count: i32,
    pub following_count: i32,
    pub reels_count: i32,
    pub is_verified: bool,
    pub interests: serde_json::Value,
    pub settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What other clients see of a user. `id` is the external uid.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
    pub bio: Option<String>,
    pub followers_count: i32,
    pub following_count: i32,
    pub reels_count: i32,
    pub is_verified: bool,
    pub interests: Vec<String>,
    pub settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        // interests are stored as a JSON array of strings; anything else reads as empty
        let interests = serde_json::from_value(u.interests.clone()).unwrap_or_default();
        Self {
            id: u.uid.clone(), email: u.email.clone(), username: u.username.clone(), display_name: u.display_name.clone(),
            profile_image_url: u.profile_image_url.clone(), bio: u.bio.clone(),
            followers_count: u.followers_count, following_count: u.following_count, reels_count: u.reels_count,
            is_verified: u.is_verified, interests, settings: u.settings.clone(),
            created_at: u.created_at, updated_at: u.updated_at,
        }
    }
}
