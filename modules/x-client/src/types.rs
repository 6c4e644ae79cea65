use chrono::{DateTime, Utc};
use serde::Deserialize;

use followlens_common::Account;

/// Paged response envelope for `/users/{id}/following`.
#[derive(Debug, Deserialize)]
pub struct FollowingResponse {
    #[serde(default)]
    pub data: Vec<UserData>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Single-user response envelope for `/users/by/username/{handle}`.
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub tweet_count: u64,
}

impl From<UserData> for Account {
    fn from(user: UserData) -> Self {
        Account {
            user_id: user.id,
            handle: user.username,
            display_name: user.name,
            bio: user.description,
            verified: user.verified,
            followers_count: user.public_metrics.followers_count,
            following_count: user.public_metrics.following_count,
            post_count: user.public_metrics.tweet_count,
            location: user.location,
            website: user.url,
            avatar_url: user.profile_image_url,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_maps_to_account() {
        let raw = r#"{
            "id": "12345",
            "username": "rustlang",
            "name": "Rust Language",
            "description": "A systems programming language",
            "verified": true,
            "public_metrics": {
                "followers_count": 800000,
                "following_count": 10,
                "tweet_count": 5000
            },
            "location": "The Internet"
        }"#;

        let user: UserData = serde_json::from_str(raw).unwrap();
        let account: Account = user.into();

        assert_eq!(account.user_id, "12345");
        assert_eq!(account.handle, "rustlang");
        assert!(account.verified);
        assert_eq!(account.followers_count, 800000);
        assert_eq!(account.post_count, 5000);
        assert_eq!(account.website, None);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let raw = r#"{"id": "1", "username": "a", "name": "A"}"#;
        let user: UserData = serde_json::from_str(raw).unwrap();
        let account: Account = user.into();
        assert_eq!(account.followers_count, 0);
        assert_eq!(account.bio, None);
    }

    #[test]
    fn following_page_parses_next_token() {
        let raw = r#"{
            "data": [{"id": "1", "username": "a", "name": "A"}],
            "meta": {"next_token": "tok123"}
        }"#;
        let page: FollowingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.meta.next_token.as_deref(), Some("tok123"));
    }
}
