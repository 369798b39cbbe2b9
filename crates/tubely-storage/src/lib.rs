//! Tubely Storage Library
//!
//! Object storage abstraction with S3 and local filesystem backends, the
//! storage key deriver, and the thumbnail store.
//!
//! # Storage key format
//!
//! Keys are flat: `{prefix}{32 lowercase hex}.{extension}`, where the prefix
//! is an orientation bucket (`landscape`, `portrait`, `other`) for videos and
//! `thumbnail` for thumbnails. Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod thumbnail;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, create_thumbnail_store};
pub use keys::{derive_storage_key, derive_storage_key_with, KeyError};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use thumbnail::{
    FilesystemThumbnailStore, InMemoryThumbnailStore, ObjectThumbnailStore, StagedThumbnail,
    Thumbnail, ThumbnailError, ThumbnailStore,
};
pub use traits::{Storage, StorageError, StorageResult};
pub use tubely_core::{StorageBackend, ThumbnailStrategy};
