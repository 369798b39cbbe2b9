//! Ingestion coordinator
//!
//! Runs one upload end to end: authorize → validate → stage → classify →
//! derive key → upload → commit. Staged payloads live in a scratch file owned
//! by a [`TempPath`], so every exit path (errors, cancellation, panics)
//! removes it.
//!
//! The metadata commit is not retried. If it fails after the object store
//! accepted the file, the object is left in place and logged as an orphan.
//! Thumbnails become visible through their store only after the commit went
//! through.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tubely_core::{AppError, Video};
use tubely_db::{UrlColumn, VideoRepository};
use tubely_processing::{AspectClassifier, AssetClass, MediaValidator, ProbeError};
use tubely_storage::{derive_storage_key, KeyError, Storage, ThumbnailError, ThumbnailStore};
use uuid::Uuid;

use crate::constants::SCRATCH_FILE_PREFIX;
use crate::error::validation_error;

/// One incoming payload: the declared media type and its bytes as they arrive.
pub struct Upload<S> {
    pub content_type: Option<String>,
    pub body: S,
}

impl<S> Upload<S>
where
    S: Stream<Item = Result<Bytes, AppError>> + Send,
{
    pub fn new(content_type: Option<String>, body: S) -> Self {
        Self { content_type, body }
    }
}

pub struct IngestionService {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    thumbnails: Arc<dyn ThumbnailStore>,
    classifier: AspectClassifier,
    video_validator: MediaValidator,
    thumbnail_validator: MediaValidator,
    scratch_dir: PathBuf,
}

impl IngestionService {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        thumbnails: Arc<dyn ThumbnailStore>,
        classifier: AspectClassifier,
        max_video_size: usize,
        max_thumbnail_size: usize,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            videos,
            storage,
            thumbnails,
            classifier,
            video_validator: MediaValidator::new(AssetClass::Video, max_video_size),
            thumbnail_validator: MediaValidator::new(AssetClass::Thumbnail, max_thumbnail_size),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn validator(&self, class: AssetClass) -> &MediaValidator {
        match class {
            AssetClass::Video => &self.video_validator,
            AssetClass::Thumbnail => &self.thumbnail_validator,
        }
    }

    /// Load the target record and confirm `user_id` owns it.
    ///
    /// Called before any of the payload is read, so a rejected request never
    /// touches scratch space or the object store.
    pub async fn authorize(&self, user_id: Uuid, video_id: Uuid) -> Result<Video, AppError> {
        let video = self
            .videos
            .get_video(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Couldn't find video".to_string()))?;

        if !video.is_owned_by(user_id) {
            tracing::warn!(
                user_id = %user_id,
                video_id = %video_id,
                "Upload rejected: caller does not own video"
            );
            return Err(AppError::Forbidden(
                "Not authorized to update this video".to_string(),
            ));
        }

        Ok(video)
    }

    /// Ingest a video file and record its URL on the video.
    #[tracing::instrument(skip(self, upload), fields(user_id = %user_id, video_id = %video_id))]
    pub async fn ingest_video<S>(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        upload: Upload<S>,
    ) -> Result<Video, AppError>
    where
        S: Stream<Item = Result<Bytes, AppError>> + Send,
    {
        let started = Instant::now();
        self.authorize(user_id, video_id).await?;

        let media = self
            .video_validator
            .validate_content_type(upload.content_type.as_deref())
            .map_err(validation_error)?;

        let staged = self.stage_to_scratch(upload.body, media.extension).await?;

        let orientation = self.classifier.classify(&staged).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to classify video");
            probe_error(e)
        })?;

        let key = derive_storage_key(orientation.prefix(), media.extension).map_err(key_error)?;

        let url = self
            .storage
            .put_file(&key, &staged, media.content_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Failed to upload video");
                AppError::StorageUpload(format!("Failed to upload video: {}", e))
            })?;

        tracing::info!(key = %key, orientation = %orientation, "Video uploaded");

        let (video, _) = self
            .commit(user_id, video_id, UrlColumn::Video, &url)
            .await?;

        drop(staged);
        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Video ingested"
        );
        Ok(video)
    }

    /// Ingest a thumbnail image and record its URL on the video.
    #[tracing::instrument(skip(self, upload), fields(user_id = %user_id, video_id = %video_id))]
    pub async fn ingest_thumbnail<S>(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        upload: Upload<S>,
    ) -> Result<Video, AppError>
    where
        S: Stream<Item = Result<Bytes, AppError>> + Send,
    {
        self.authorize(user_id, video_id).await?;

        let media = self
            .thumbnail_validator
            .validate_content_type(upload.content_type.as_deref())
            .map_err(validation_error)?;

        let data = self.buffer(upload.body).await?;

        let staged = self
            .thumbnails
            .store(video_id, data, media.content_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to store thumbnail");
                thumbnail_error(e)
            })?;

        tracing::info!(
            url = %staged.url,
            strategy = %self.thumbnails.strategy(),
            "Thumbnail stored"
        );

        match self
            .commit(user_id, video_id, UrlColumn::Thumbnail, &staged.url)
            .await
        {
            Ok((video, replaced)) => {
                self.thumbnails.publish(&staged, replaced.as_deref()).await;
                Ok(video)
            }
            Err(e) => {
                self.thumbnails.discard(staged).await;
                Err(e)
            }
        }
    }

    /// Re-read the record, re-check ownership, then write `url` to `column`.
    ///
    /// Returns the updated record and the URL it replaced.
    async fn commit(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        column: UrlColumn,
        url: &str,
    ) -> Result<(Video, Option<String>), AppError> {
        let video = match self.videos.get_video(video_id).await {
            Ok(Some(video)) => video,
            Ok(None) => {
                tracing::warn!(url = %url, "Video removed during upload; upload orphaned");
                return Err(AppError::MetadataCommit(
                    "Video no longer exists".to_string(),
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Failed to reload video; upload orphaned");
                return Err(AppError::MetadataCommit(e.to_string()));
            }
        };

        if !video.is_owned_by(user_id) {
            tracing::warn!(url = %url, "Ownership changed during upload; upload orphaned");
            return Err(AppError::Forbidden(
                "Not authorized to update this video".to_string(),
            ));
        }

        let replaced = column.get(&video).map(str::to_string);

        let updated = self
            .videos
            .update_url(video_id, user_id, column, url)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Failed to update video; upload orphaned");
                AppError::MetadataCommit(e.to_string())
            })?;

        Ok((updated, replaced))
    }

    /// Spool the body to a scratch file, enforcing the size bound as bytes arrive.
    async fn stage_to_scratch<S>(&self, body: S, extension: &str) -> Result<TempPath, AppError>
    where
        S: Stream<Item = Result<Bytes, AppError>> + Send,
    {
        let suffix = format!(".{}", extension);
        let (file, path) = tempfile::Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create scratch file: {}", e)))?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        let mut body = std::pin::pin!(body);
        let mut received = 0usize;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            received += chunk.len();
            self.video_validator
                .check_size(received)
                .map_err(validation_error)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to write scratch file: {}", e)))?;
        }

        self.video_validator
            .validate_file_size(received)
            .map_err(validation_error)?;

        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write scratch file: {}", e)))?;

        tracing::debug!(path = %path.display(), size_bytes = received, "Video staged");
        Ok(path)
    }

    /// Collect a small payload in memory under the thumbnail bound.
    async fn buffer<S>(&self, body: S) -> Result<Bytes, AppError>
    where
        S: Stream<Item = Result<Bytes, AppError>> + Send,
    {
        let mut body = std::pin::pin!(body);
        let mut data = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            self.thumbnail_validator
                .check_size(data.len() + chunk.len())
                .map_err(validation_error)?;
            data.extend_from_slice(&chunk);
        }

        self.thumbnail_validator
            .validate_file_size(data.len())
            .map_err(validation_error)?;

        Ok(data.freeze())
    }
}

fn probe_error(err: ProbeError) -> AppError {
    AppError::Probe(err.to_string())
}

fn key_error(err: KeyError) -> AppError {
    match err {
        KeyError::RandomSource(msg) => {
            tracing::error!(error = %msg, "Random source failed");
            AppError::RandomSource(msg)
        }
        KeyError::InvalidExtension(ext) => {
            AppError::Internal(format!("Invalid storage key extension: {}", ext))
        }
    }
}

fn thumbnail_error(err: ThumbnailError) -> AppError {
    match err {
        ThumbnailError::UnsupportedContentType(ct) => {
            AppError::UnsupportedMediaType(format!("Invalid file type: {}", ct))
        }
        ThumbnailError::Key(e) => key_error(e),
        ThumbnailError::Storage(e) => AppError::StorageUpload(e.to_string()),
        ThumbnailError::Io(e) => AppError::StorageUpload(e.to_string()),
        ThumbnailError::NotFound(id) => {
            AppError::Internal(format!("Thumbnail for {} vanished while storing", id))
        }
    }
}
