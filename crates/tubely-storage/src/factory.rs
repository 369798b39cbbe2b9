#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::thumbnail::{
    FilesystemThumbnailStore, InMemoryThumbnailStore, ObjectThumbnailStore, ThumbnailError,
    ThumbnailStore,
};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use tubely_core::{Config, ThumbnailStrategy};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(bucket, region, endpoint)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config
                .local_storage_base_url()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
                })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Create the thumbnail store selected by `THUMBNAIL_STRATEGY`.
pub async fn create_thumbnail_store(
    config: &Config,
    storage: Arc<dyn Storage>,
) -> Result<Arc<dyn ThumbnailStore>, ThumbnailError> {
    let store: Arc<dyn ThumbnailStore> = match config.thumbnail_strategy() {
        ThumbnailStrategy::Memory => Arc::new(InMemoryThumbnailStore::new(config.public_base_url())),
        ThumbnailStrategy::Filesystem => Arc::new(
            FilesystemThumbnailStore::new(config.assets_root(), config.public_base_url()).await?,
        ),
        ThumbnailStrategy::ObjectStore => Arc::new(ObjectThumbnailStore::new(storage)),
    };

    tracing::info!(strategy = %store.strategy(), "Thumbnail store initialized");
    Ok(store)
}
