//! Service initialization and application state setup

use crate::auth::JwtService;
use crate::services::ingest::IngestionService;
use crate::state::{AppState, MediaState};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tubely_core::Config;
use tubely_db::VideoRepository;
use tubely_processing::{AspectClassifier, FfprobeProbe};
use tubely_storage::{Storage, ThumbnailStore};

/// Build the application state from already-initialized collaborators.
pub async fn initialize_services(
    config: &Config,
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    thumbnails: Arc<dyn ThumbnailStore>,
) -> Result<Arc<AppState>> {
    let probe = FfprobeProbe::new(config.ffprobe_path(), config.probe_timeout())
        .context("Invalid FFPROBE_PATH")?;
    let classifier = AspectClassifier::new(Arc::new(probe), config.aspect_tolerance());

    let scratch_dir = prepare_scratch_dir(config).await?;

    tracing::info!(
        ffprobe_path = %config.ffprobe_path(),
        probe_timeout_secs = config.probe_timeout().as_secs(),
        aspect_tolerance = config.aspect_tolerance(),
        scratch_dir = %scratch_dir.display(),
        "Ingestion pipeline configured"
    );

    let ingest = IngestionService::new(
        videos.clone(),
        storage.clone(),
        thumbnails.clone(),
        classifier,
        config.max_video_size_bytes(),
        config.max_thumbnail_size_bytes(),
        scratch_dir,
    );

    Ok(Arc::new(AppState {
        videos,
        media: MediaState {
            ingest: Arc::new(ingest),
            storage,
            thumbnails,
        },
        jwt: Arc::new(JwtService::new(config.jwt_secret())),
    }))
}

async fn prepare_scratch_dir(config: &Config) -> Result<PathBuf> {
    let dir = config
        .scratch_dir()
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;

    Ok(dir)
}
