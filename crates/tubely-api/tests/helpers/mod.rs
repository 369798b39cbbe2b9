//! Test helpers: build AppState and router over in-memory collaborators.
//!
//! Run from workspace root: `cargo test -p tubely-api`.

#![allow(dead_code)]

pub mod auth;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tubely_api::auth::JwtService;
use tubely_api::setup::routes;
use tubely_api::state::{AppState, MediaState};
use tubely_api::IngestionService;
use tubely_core::{Config, IngestConfig, StorageBackend, ThumbnailStrategy, Video};
use tubely_db::InMemoryVideoRepository;
use tubely_processing::{AspectClassifier, Dimensions, MediaProbe, ProbeError};
use tubely_storage::{InMemoryThumbnailStore, LocalStorage, Storage};
use uuid::Uuid;

pub const PUBLIC_BASE_URL: &str = "http://localhost:8091";
pub const MEDIA_BASE_URL: &str = "http://localhost:8091/media";

/// Probe that reports fixed dimensions (or fails when `None`) and counts calls.
pub struct ScriptedProbe {
    dimensions: Option<Dimensions>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(dimensions: Option<(u64, u64)>) -> Self {
        Self {
            dimensions: dimensions.map(|(width, height)| Dimensions { width, height }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProbe for ScriptedProbe {
    async fn probe(&self, _path: &Path) -> Result<Dimensions, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dimensions.ok_or_else(|| ProbeError::NonZeroExit {
            status: Some(1),
            stderr: "moov atom not found".to_string(),
        })
    }
}

pub struct TestOptions {
    pub dimensions: Option<(u64, u64)>,
    pub max_video_size_bytes: usize,
    pub max_thumbnail_size_bytes: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            dimensions: Some((1280, 720)),
            max_video_size_bytes: 1024 * 1024,
            max_thumbnail_size_bytes: 256 * 1024,
        }
    }
}

/// Test application: server plus handles on every collaborator.
pub struct TestApp {
    pub server: TestServer,
    pub videos: Arc<InMemoryVideoRepository>,
    pub thumbnails: Arc<InMemoryThumbnailStore>,
    pub probe: Arc<ScriptedProbe>,
    pub jwt: JwtService,
    pub media_dir: PathBuf,
    pub scratch_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Seed a video owned by `user_id`.
    pub async fn create_video(&self, user_id: Uuid) -> Video {
        let video = Video::new(user_id, "Boots demo");
        self.videos.insert(video.clone()).await;
        video
    }

    pub fn stored_objects(&self) -> Vec<String> {
        match std::fs::read_dir(&self.media_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(&self.scratch_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let media_dir = temp_dir.path().join("media");
    let scratch_dir = temp_dir.path().join("scratch");
    let assets_dir = temp_dir.path().join("assets");
    std::fs::create_dir_all(&scratch_dir).expect("Failed to create scratch dir");
    std::fs::create_dir_all(&assets_dir).expect("Failed to create assets dir");

    let mut ingest_config = IngestConfig::default();
    ingest_config.base.public_base_url = PUBLIC_BASE_URL.to_string();
    ingest_config.base.jwt_secret = auth::TEST_JWT_SECRET.to_string();
    ingest_config.storage_backend = StorageBackend::Local;
    ingest_config.local_storage_path = Some(media_dir.to_string_lossy().into_owned());
    ingest_config.local_storage_base_url = Some(MEDIA_BASE_URL.to_string());
    ingest_config.assets_root = assets_dir.to_string_lossy().into_owned();
    ingest_config.thumbnail_strategy = ThumbnailStrategy::Memory;
    ingest_config.max_video_size_bytes = options.max_video_size_bytes;
    ingest_config.max_thumbnail_size_bytes = options.max_thumbnail_size_bytes;
    ingest_config.scratch_dir = Some(scratch_dir.to_string_lossy().into_owned());
    let config = Config::from(ingest_config);

    let videos = Arc::new(InMemoryVideoRepository::new());
    let thumbnails = Arc::new(InMemoryThumbnailStore::new(PUBLIC_BASE_URL));
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&media_dir, MEDIA_BASE_URL.to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let probe = Arc::new(ScriptedProbe::new(options.dimensions));

    let ingest = IngestionService::new(
        videos.clone(),
        storage.clone(),
        thumbnails.clone(),
        AspectClassifier::new(probe.clone(), config.aspect_tolerance()),
        config.max_video_size_bytes(),
        config.max_thumbnail_size_bytes(),
        &scratch_dir,
    );

    let state = Arc::new(AppState {
        videos: videos.clone(),
        media: MediaState {
            ingest: Arc::new(ingest),
            storage,
            thumbnails: thumbnails.clone(),
        },
        jwt: Arc::new(JwtService::new(auth::TEST_JWT_SECRET)),
    });

    let app = routes::setup_routes(&config, state).expect("Failed to build router");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        videos,
        thumbnails,
        probe,
        jwt: JwtService::new(auth::TEST_JWT_SECRET),
        media_dir,
        scratch_dir,
        _temp_dir: temp_dir,
    }
}

/// A multipart form with one file part.
pub fn file_form(field: &str, data: Vec<u8>, file_name: &str, mime_type: &str) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(data))
        .file_name(file_name.to_string())
        .mime_type(mime_type.to_string());
    MultipartForm::new().add_part(field.to_string(), part)
}

pub fn mp4_form(data: Vec<u8>) -> MultipartForm {
    file_form("video", data, "boots.mp4", "video/mp4")
}
