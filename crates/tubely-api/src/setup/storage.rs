//! Object storage and thumbnail store setup

use anyhow::{Context, Result};
use std::sync::Arc;
use tubely_core::Config;
use tubely_storage::{create_storage, create_thumbnail_store, Storage, ThumbnailStore};

pub async fn setup_storage(
    config: &Config,
) -> Result<(Arc<dyn Storage>, Arc<dyn ThumbnailStore>)> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;

    let thumbnails = create_thumbnail_store(config, storage.clone())
        .await
        .context("Failed to initialize thumbnail store")?;

    tracing::info!(
        backend = %storage.backend_type(),
        thumbnail_strategy = %thumbnails.strategy(),
        "Storage initialized"
    );

    Ok((storage, thumbnails))
}
