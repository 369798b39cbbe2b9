//! Application state and sub-state extractors.

use crate::auth::JwtService;
use crate::services::ingest::IngestionService;
use std::sync::Arc;
use tubely_db::VideoRepository;
use tubely_storage::{Storage, ThumbnailStore};

/// Upload pipeline and the stores it writes to.
#[derive(Clone)]
pub struct MediaState {
    pub ingest: Arc<IngestionService>,
    pub storage: Arc<dyn Storage>,
    pub thumbnails: Arc<dyn ThumbnailStore>,
}

/// Main application state.
#[derive(Clone)]
pub struct AppState {
    pub videos: Arc<dyn VideoRepository>,
    pub media: MediaState,
    pub jwt: Arc<JwtService>,
}

impl axum::extract::FromRef<Arc<AppState>> for MediaState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}
