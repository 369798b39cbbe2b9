//! Thumbnail storage.
//!
//! Every strategy follows the same two-phase contract. `store` writes the
//! bytes under a freshly derived `thumbnail{hex}.{ext}` key, where nothing the
//! video record references can see them, and returns a [`StagedThumbnail`]
//! carrying the URL to commit. Once the metadata commit has succeeded the
//! coordinator calls `publish`; if it failed, `discard`. Served state never
//! changes before the record does. Which strategy runs is decided once at
//! startup from [`ThumbnailStrategy`].

use crate::keys::{derive_storage_key, KeyError};
use crate::traits::{validate_key, Storage, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tubely_core::media_types;
use tubely_core::ThumbnailStrategy;
use uuid::Uuid;

/// Key prefix for every stored thumbnail.
pub const THUMBNAIL_KEY_PREFIX: &str = "thumbnail";

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("thumbnail not found for video {0}")]
    NotFound(Uuid),

    #[error("unsupported thumbnail content type: {0}")]
    UnsupportedContentType(String),

    #[error("thumbnail key: {0}")]
    Key(#[from] KeyError),

    #[error("thumbnail storage: {0}")]
    Storage(#[from] StorageError),

    #[error("thumbnail io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub data: Bytes,
    pub content_type: String,
}

/// A thumbnail written by `store` but not yet visible through `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedThumbnail {
    pub video_id: Uuid,
    /// Derived `thumbnail{hex}.{ext}` key.
    pub key: String,
    /// URL to record on the video.
    pub url: String,
}

#[async_trait]
pub trait ThumbnailStore: Send + Sync {
    /// Persist a thumbnail for `video_id` without changing what is served for it.
    async fn store(
        &self,
        video_id: Uuid,
        data: Bytes,
        content_type: &str,
    ) -> Result<StagedThumbnail, ThumbnailError>;

    /// Make a committed thumbnail the one served for its video.
    ///
    /// `replaced` is the URL the commit overwrote. Runs after the record
    /// already points at `staged.url`, so failures here are logged, not
    /// returned.
    async fn publish(&self, _staged: &StagedThumbnail, _replaced: Option<&str>) {}

    /// Forget a thumbnail whose commit failed.
    async fn discard(&self, staged: StagedThumbnail) {
        tracing::warn!(video_id = %staged.video_id, key = %staged.key, "Thumbnail orphaned");
    }

    /// Load the published thumbnail for a video.
    async fn fetch(&self, video_id: Uuid) -> Result<Thumbnail, ThumbnailError>;

    /// Drop volatile state. Called once during shutdown.
    async fn clear(&self) {}

    fn strategy(&self) -> ThumbnailStrategy;
}

fn image_extension(content_type: &str) -> Result<&'static str, ThumbnailError> {
    match media_types::extension_for(content_type) {
        Some(ext) if ext != "mp4" => Ok(ext),
        _ => Err(ThumbnailError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn content_type_of(key: &str) -> &'static str {
    key.rsplit_once('.')
        .and_then(|(_, ext)| media_types::media_type_for_extension(ext))
        .unwrap_or(media_types::IMAGE_JPEG)
}

#[derive(Default)]
struct Slots {
    served: HashMap<Uuid, Thumbnail>,
    staged: HashMap<String, Thumbnail>,
}

/// Process-scoped map of thumbnails, served by the API itself.
pub struct InMemoryThumbnailStore {
    slots: RwLock<Slots>,
    public_base_url: String,
}

impl InMemoryThumbnailStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Number of videos with a published thumbnail.
    pub async fn len(&self) -> usize {
        self.slots.read().await.served.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.served.is_empty()
    }

    /// Number of thumbnails stored but neither published nor discarded.
    pub async fn staged_len(&self) -> usize {
        self.slots.read().await.staged.len()
    }
}

#[async_trait]
impl ThumbnailStore for InMemoryThumbnailStore {
    async fn store(
        &self,
        video_id: Uuid,
        data: Bytes,
        content_type: &str,
    ) -> Result<StagedThumbnail, ThumbnailError> {
        let ext = image_extension(content_type)?;
        let key = derive_storage_key(THUMBNAIL_KEY_PREFIX, ext)?;
        let thumbnail = Thumbnail {
            data,
            content_type: content_type_of(&key).to_string(),
        };

        // Only the insert runs under the lock.
        self.slots
            .write()
            .await
            .staged
            .insert(key.clone(), thumbnail);

        Ok(StagedThumbnail {
            video_id,
            url: format!("{}/thumbnails/{}", self.public_base_url, video_id),
            key,
        })
    }

    async fn publish(&self, staged: &StagedThumbnail, _replaced: Option<&str>) {
        let mut slots = self.slots.write().await;
        match slots.staged.remove(&staged.key) {
            Some(thumbnail) => {
                slots.served.insert(staged.video_id, thumbnail);
            }
            None => tracing::warn!(key = %staged.key, "Published thumbnail was not staged"),
        }
    }

    async fn discard(&self, staged: StagedThumbnail) {
        self.slots.write().await.staged.remove(&staged.key);
        tracing::debug!(video_id = %staged.video_id, key = %staged.key, "Staged thumbnail dropped");
    }

    async fn fetch(&self, video_id: Uuid) -> Result<Thumbnail, ThumbnailError> {
        self.slots
            .read()
            .await
            .served
            .get(&video_id)
            .cloned()
            .ok_or(ThumbnailError::NotFound(video_id))
    }

    async fn clear(&self) {
        let mut slots = self.slots.write().await;
        let dropped = slots.served.len() + slots.staged.len();
        slots.served.clear();
        slots.staged.clear();
        tracing::info!(dropped, "In-memory thumbnail store cleared");
    }

    fn strategy(&self) -> ThumbnailStrategy {
        ThumbnailStrategy::Memory
    }
}

/// Thumbnails written as `{assets_root}/thumbnail{hex}.{ext}` and served from `/assets`.
///
/// A file is never overwritten. The one a record used to reference is removed
/// on `publish`, after the record has moved on. `fetch` resolves through the
/// files published by this process.
pub struct FilesystemThumbnailStore {
    assets_root: PathBuf,
    assets_url: String,
    published: RwLock<HashMap<Uuid, String>>,
}

impl FilesystemThumbnailStore {
    pub async fn new(
        assets_root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, ThumbnailError> {
        let assets_root = assets_root.into();
        tokio::fs::create_dir_all(&assets_root).await?;
        Ok(Self {
            assets_root,
            assets_url: format!("{}/assets/", public_base_url.into().trim_end_matches('/')),
            published: RwLock::new(HashMap::new()),
        })
    }

    /// File name under the assets root that `url` points at, if any.
    fn file_name_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url.strip_prefix(&self.assets_url)?;
        (validate_key(name).is_ok() && !name.contains('/')).then_some(name)
    }

    async fn remove_replaced(&self, file_name: &str) {
        let path = self.assets_root.join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed replaced thumbnail"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to remove replaced thumbnail"
            ),
        }
    }
}

#[async_trait]
impl ThumbnailStore for FilesystemThumbnailStore {
    async fn store(
        &self,
        video_id: Uuid,
        data: Bytes,
        content_type: &str,
    ) -> Result<StagedThumbnail, ThumbnailError> {
        let ext = image_extension(content_type)?;
        let key = derive_storage_key(THUMBNAIL_KEY_PREFIX, ext)?;
        let path = self.assets_root.join(&key);

        tokio::fs::write(&path, &data).await?;

        tracing::info!(
            video_id = %video_id,
            path = %path.display(),
            size_bytes = data.len(),
            "Thumbnail written to assets root"
        );

        Ok(StagedThumbnail {
            video_id,
            url: format!("{}{}", self.assets_url, key),
            key,
        })
    }

    async fn publish(&self, staged: &StagedThumbnail, replaced: Option<&str>) {
        self.published
            .write()
            .await
            .insert(staged.video_id, staged.key.clone());

        if let Some(old) = replaced.and_then(|url| self.file_name_of(url)) {
            if old != staged.key {
                self.remove_replaced(old).await;
            }
        }
    }

    async fn fetch(&self, video_id: Uuid) -> Result<Thumbnail, ThumbnailError> {
        let key = self
            .published
            .read()
            .await
            .get(&video_id)
            .cloned()
            .ok_or(ThumbnailError::NotFound(video_id))?;

        match tokio::fs::read(self.assets_root.join(&key)).await {
            Ok(data) => Ok(Thumbnail {
                data: Bytes::from(data),
                content_type: content_type_of(&key).to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ThumbnailError::NotFound(video_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) {
        self.published.write().await.clear();
    }

    fn strategy(&self) -> ThumbnailStrategy {
        ThumbnailStrategy::Filesystem
    }
}

/// Thumbnails pushed to the durable object store under a derived key.
///
/// The bucket serves them, so `fetch` always reports `NotFound`.
pub struct ObjectThumbnailStore {
    storage: Arc<dyn Storage>,
}

impl ObjectThumbnailStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ThumbnailStore for ObjectThumbnailStore {
    async fn store(
        &self,
        video_id: Uuid,
        data: Bytes,
        content_type: &str,
    ) -> Result<StagedThumbnail, ThumbnailError> {
        let ext = image_extension(content_type)?;
        let key = derive_storage_key(THUMBNAIL_KEY_PREFIX, ext)?;
        let url = self
            .storage
            .put_object(&key, data, &media_types::normalize(content_type))
            .await?;

        tracing::info!(video_id = %video_id, key = %key, "Thumbnail uploaded to object store");
        Ok(StagedThumbnail { video_id, key, url })
    }

    async fn fetch(&self, video_id: Uuid) -> Result<Thumbnail, ThumbnailError> {
        Err(ThumbnailError::NotFound(video_id))
    }

    fn strategy(&self) -> ThumbnailStrategy {
        ThumbnailStrategy::ObjectStore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use tempfile::TempDir;

    const BASE_URL: &str = "http://localhost:8091";

    fn assert_thumbnail_key(key: &str, ext: &str) {
        let pattern = Regex::new(&format!("^thumbnail[0-9a-f]{{32}}\\.{}$", ext)).unwrap();
        assert!(pattern.is_match(key), "unexpected key {}", key);
    }

    async fn publish_new(store: &dyn ThumbnailStore, id: Uuid, data: &'static [u8], ct: &str) {
        let staged = store.store(id, Bytes::from_static(data), ct).await.unwrap();
        store.publish(&staged, None).await;
    }

    #[tokio::test]
    async fn test_memory_store_then_publish() {
        let store = InMemoryThumbnailStore::new(format!("{}/", BASE_URL));
        let id = Uuid::new_v4();

        let staged = store
            .store(id, Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .unwrap();
        assert_eq!(staged.url, format!("{}/thumbnails/{}", BASE_URL, id));
        assert_thumbnail_key(&staged.key, "png");

        // Nothing is served until the commit went through.
        assert!(matches!(
            store.fetch(id).await,
            Err(ThumbnailError::NotFound(missing)) if missing == id
        ));

        store.publish(&staged, None).await;
        let thumbnail = store.fetch(id).await.unwrap();
        assert_eq!(thumbnail.data.as_ref(), b"png-bytes");
        assert_eq!(thumbnail.content_type, "image/png");
        assert_eq!(store.staged_len().await, 0);
    }

    #[tokio::test]
    async fn test_memory_discard_keeps_served_thumbnail() {
        let store = InMemoryThumbnailStore::new(BASE_URL);
        let id = Uuid::new_v4();
        publish_new(&store, id, b"original", "image/jpeg").await;

        let staged = store
            .store(id, Bytes::from_static(b"replacement"), "image/png")
            .await
            .unwrap();
        store.discard(staged).await;

        let thumbnail = store.fetch(id).await.unwrap();
        assert_eq!(thumbnail.data.as_ref(), b"original");
        assert_eq!(thumbnail.content_type, "image/jpeg");
        assert_eq!(store.staged_len().await, 0);
    }

    #[tokio::test]
    async fn test_memory_store_cleared() {
        let store = InMemoryThumbnailStore::new(BASE_URL);
        let id = Uuid::new_v4();
        publish_new(&store, id, b"x", "image/jpeg").await;
        store
            .store(Uuid::new_v4(), Bytes::from_static(b"y"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.staged_len().await, 1);

        store.clear().await;
        assert!(store.is_empty().await);
        assert_eq!(store.staged_len().await, 0);
        assert!(store.fetch(id).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_gif_without_mutation() {
        let store = InMemoryThumbnailStore::new(BASE_URL);
        let err = store
            .store(Uuid::new_v4(), Bytes::from_static(b"GIF89a"), "image/gif")
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::UnsupportedContentType(_)));
        assert!(store.is_empty().await);
        assert_eq!(store.staged_len().await, 0);
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_uploads() {
        let store = Arc::new(InMemoryThumbnailStore::new(BASE_URL));
        let ids: Vec<Uuid> = (0..64).map(|_| Uuid::new_v4()).collect();

        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = Arc::clone(&store);
                let id = *id;
                tokio::spawn(async move {
                    let staged = store
                        .store(id, Bytes::from(id.to_string()), "image/jpeg")
                        .await?;
                    store.publish(&staged, None).await;
                    Ok::<_, ThumbnailError>(())
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await, 64);
        for id in ids {
            let thumbnail = store.fetch(id).await.unwrap();
            assert_eq!(thumbnail.data, Bytes::from(id.to_string()));
        }
    }

    #[tokio::test]
    async fn test_filesystem_store_writes_derived_file() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemThumbnailStore::new(dir.path(), BASE_URL)
            .await
            .unwrap();
        let id = Uuid::new_v4();

        let staged = store
            .store(id, Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_thumbnail_key(&staged.key, "jpeg");
        assert_eq!(staged.url, format!("{}/assets/{}", BASE_URL, staged.key));
        assert!(dir.path().join(&staged.key).exists());
        assert!(store.fetch(id).await.is_err());

        store.publish(&staged, None).await;
        let thumbnail = store.fetch(id).await.unwrap();
        assert_eq!(thumbnail.data.as_ref(), b"jpeg");
        assert_eq!(thumbnail.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_filesystem_publish_removes_replaced_file() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemThumbnailStore::new(dir.path(), BASE_URL)
            .await
            .unwrap();
        let id = Uuid::new_v4();

        let first = store
            .store(id, Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        store.publish(&first, None).await;

        let second = store
            .store(id, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        // Both files exist until the replacement is published.
        assert!(dir.path().join(&first.key).exists());
        store.publish(&second, Some(&first.url)).await;

        assert!(!dir.path().join(&first.key).exists());
        let thumbnail = store.fetch(id).await.unwrap();
        assert_eq!(thumbnail.data.as_ref(), b"png");
        assert_eq!(thumbnail.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_filesystem_discard_keeps_published_file() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemThumbnailStore::new(dir.path(), BASE_URL)
            .await
            .unwrap();
        let id = Uuid::new_v4();

        let first = store
            .store(id, Bytes::from_static(b"original"), "image/jpeg")
            .await
            .unwrap();
        store.publish(&first, None).await;

        let second = store
            .store(id, Bytes::from_static(b"replacement"), "image/png")
            .await
            .unwrap();
        store.discard(second).await;

        assert_eq!(std::fs::read(dir.path().join(&first.key)).unwrap(), b"original");
        let thumbnail = store.fetch(id).await.unwrap();
        assert_eq!(thumbnail.data.as_ref(), b"original");
    }

    #[tokio::test]
    async fn test_filesystem_publish_ignores_foreign_urls() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("keep.png");
        std::fs::write(&victim, b"keep").unwrap();

        let store = FilesystemThumbnailStore::new(dir.path(), BASE_URL)
            .await
            .unwrap();
        let id = Uuid::new_v4();
        let staged = store
            .store(id, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let escaping = format!("{}/assets/../{}", BASE_URL, victim.display());
        store.publish(&staged, Some(&escaping)).await;
        store
            .publish(&staged, Some("https://bucket.s3.us-east-1.amazonaws.com/thumbnail.png"))
            .await;

        assert!(victim.exists());
        assert!(dir.path().join(&staged.key).exists());
    }

    #[tokio::test]
    async fn test_filesystem_store_missing() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemThumbnailStore::new(dir.path(), BASE_URL)
            .await
            .unwrap();
        assert!(matches!(
            store.fetch(Uuid::new_v4()).await,
            Err(ThumbnailError::NotFound(_))
        ));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn test_object_store_uses_thumbnail_prefix() {
        use crate::LocalStorage;

        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://cdn.test/media".to_string())
            .await
            .unwrap();
        let store = ObjectThumbnailStore::new(Arc::new(storage));
        let id = Uuid::new_v4();

        let staged = store
            .store(id, Bytes::from_static(b"png"), "image/png; charset=binary")
            .await
            .unwrap();
        store.publish(&staged, None).await;

        let pattern = Regex::new(r"^http://cdn\.test/media/thumbnail[0-9a-f]{32}\.png$").unwrap();
        assert!(pattern.is_match(&staged.url), "unexpected url {}", staged.url);
        assert!(matches!(
            store.fetch(id).await,
            Err(ThumbnailError::NotFound(_))
        ));
        assert_eq!(store.strategy(), ThumbnailStrategy::ObjectStore);
    }
}
