use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A video record owned by a single user.
///
/// The ingestion pipeline never creates or deletes records; it only reads
/// them and fills in `thumbnail_url` / `video_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Build an unattached record, mostly useful for seeding stores.
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            description: None,
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_video_has_no_urls() {
        let owner = Uuid::new_v4();
        let video = Video::new(owner, "Boots demo");
        assert!(video.is_owned_by(owner));
        assert!(!video.is_owned_by(Uuid::new_v4()));
        assert!(video.thumbnail_url.is_none());
        assert!(video.video_url.is_none());
    }

    #[test]
    fn test_video_serializes_urls_as_null() {
        let video = Video::new(Uuid::new_v4(), "clip");
        let json = serde_json::to_value(&video).unwrap();
        assert!(json["video_url"].is_null());
        assert_eq!(json["title"], "clip");
    }
}
