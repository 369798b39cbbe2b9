use crate::video::{UrlColumn, VideoRepository};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tubely_core::{AppError, Video};
use uuid::Uuid;

/// Process-local video store.
#[derive(Default)]
pub struct InMemoryVideoRepository {
    videos: RwLock<HashMap<Uuid, Video>>,
    fail_updates: AtomicBool,
    updates: AtomicUsize,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, video: Video) {
        self.videos.write().await.insert(video.id, video);
    }

    /// Reassign a record, e.g. to simulate a transfer mid-upload.
    pub async fn set_owner(&self, id: Uuid, user_id: Uuid) {
        if let Some(video) = self.videos.write().await.get_mut(&id) {
            video.user_id = user_id;
        }
    }

    /// Make every subsequent `update_url` fail until switched off.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of successful updates so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        column: UrlColumn,
        url: &str,
    ) -> Result<Video, AppError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated update failure".to_string()));
        }

        let mut videos = self.videos.write().await;
        let stored = videos
            .get_mut(&id)
            .filter(|stored| stored.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?;

        let slot = match column {
            UrlColumn::Thumbnail => &mut stored.thumbnail_url,
            UrlColumn::Video => &mut stored.video_url,
        };
        *slot = Some(url.to_string());
        stored.updated_at = Utc::now();
        self.updates.fetch_add(1, Ordering::SeqCst);

        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_URL: &str = "https://bucket/landscape.mp4";
    const THUMBNAIL_URL: &str = "https://bucket/thumbnail.png";

    #[tokio::test]
    async fn test_update_only_touches_named_column() {
        let repo = InMemoryVideoRepository::new();
        let owner = Uuid::new_v4();
        let video = Video::new(owner, "clip");
        repo.insert(video.clone()).await;

        let updated = repo
            .update_url(video.id, owner, UrlColumn::Video, VIDEO_URL)
            .await
            .unwrap();
        assert_eq!(updated.title, "clip");
        assert_eq!(updated.video_url.as_deref(), Some(VIDEO_URL));
        assert!(updated.thumbnail_url.is_none());
        assert!(updated.updated_at >= video.updated_at);
        assert_eq!(repo.update_count(), 1);
    }

    #[tokio::test]
    async fn test_commits_from_stale_snapshots_do_not_undo_each_other() {
        let repo = InMemoryVideoRepository::new();
        let owner = Uuid::new_v4();
        let video = Video::new(owner, "clip");
        repo.insert(video.clone()).await;

        // Both writers read the record before either of them commits.
        let snapshot = repo.get_video(video.id).await.unwrap().unwrap();
        assert!(UrlColumn::Video.get(&snapshot).is_none());

        repo.update_url(video.id, owner, UrlColumn::Thumbnail, THUMBNAIL_URL)
            .await
            .unwrap();
        let updated = repo
            .update_url(video.id, owner, UrlColumn::Video, VIDEO_URL)
            .await
            .unwrap();

        assert_eq!(UrlColumn::Thumbnail.get(&updated), Some(THUMBNAIL_URL));
        assert_eq!(UrlColumn::Video.get(&updated), Some(VIDEO_URL));
    }

    #[tokio::test]
    async fn test_update_rejects_changed_owner() {
        let repo = InMemoryVideoRepository::new();
        let owner = Uuid::new_v4();
        let video = Video::new(owner, "clip");
        repo.insert(video.clone()).await;
        repo.set_owner(video.id, Uuid::new_v4()).await;

        let err = repo
            .update_url(video.id, owner, UrlColumn::Video, VIDEO_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(repo.update_count(), 0);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let repo = InMemoryVideoRepository::new();
        let owner = Uuid::new_v4();
        let video = Video::new(owner, "clip");
        repo.insert(video.clone()).await;
        repo.fail_updates(true);
        assert!(repo
            .update_url(video.id, owner, UrlColumn::Thumbnail, THUMBNAIL_URL)
            .await
            .is_err());
        repo.fail_updates(false);
        assert!(repo
            .update_url(video.id, owner, UrlColumn::Thumbnail, THUMBNAIL_URL)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = InMemoryVideoRepository::new();
        assert!(repo.get_video(Uuid::new_v4()).await.unwrap().is_none());
    }
}
