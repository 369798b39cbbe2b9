use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tubely_core::{AppError, Video};
use uuid::Uuid;

/// Which URL column an ingestion commit writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlColumn {
    Thumbnail,
    Video,
}

impl UrlColumn {
    /// Current value of this column on `video`.
    pub fn get(self, video: &Video) -> Option<&str> {
        match self {
            UrlColumn::Thumbnail => video.thumbnail_url.as_deref(),
            UrlColumn::Video => video.video_url.as_deref(),
        }
    }
}

/// Point operations against video records.
///
/// The store is trusted for its own consistency; callers never lock around it.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Set one URL column and bump `updated_at`, leaving every other column as
    /// stored. Fails with `NotFound` when no record with that id is still
    /// owned by `user_id`.
    async fn update_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        column: UrlColumn,
        url: &str,
    ) -> Result<Video, AppError>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(
            r#"
            SELECT id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self, url), fields(db.table = "videos", db.operation = "update", video_id = %id, column = ?column))]
    async fn update_url(
        &self,
        id: Uuid,
        user_id: Uuid,
        column: UrlColumn,
        url: &str,
    ) -> Result<Video, AppError> {
        // Owner is part of the predicate so a concurrent ownership change makes
        // this a no-op instead of a write on someone else's record.
        let query = match column {
            UrlColumn::Thumbnail => {
                r#"
                UPDATE videos
                SET thumbnail_url = $3, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at
                "#
            }
            UrlColumn::Video => {
                r#"
                UPDATE videos
                SET video_url = $3, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at
                "#
            }
        };

        let updated = sqlx::query_as::<Postgres, Video>(query)
            .bind(id)
            .bind(user_id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        updated.ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
