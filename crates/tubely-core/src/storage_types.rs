use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Object storage backend used for durable uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

/// Where thumbnail images end up.
///
/// `Memory` keeps them in a process-scoped map and serves them from
/// `/thumbnails/{id}`; `Filesystem` writes them under the public assets
/// root; `ObjectStore` pushes them through the same storage backend as videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThumbnailStrategy {
    Memory,
    Filesystem,
    #[default]
    ObjectStore,
}

impl FromStr for ThumbnailStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(ThumbnailStrategy::Memory),
            "filesystem" | "fs" => Ok(ThumbnailStrategy::Filesystem),
            "object-store" | "object_store" | "s3" => Ok(ThumbnailStrategy::ObjectStore),
            _ => Err(anyhow::anyhow!("Invalid thumbnail strategy: {}", s)),
        }
    }
}

impl Display for ThumbnailStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ThumbnailStrategy::Memory => write!(f, "memory"),
            ThumbnailStrategy::Filesystem => write!(f, "filesystem"),
            ThumbnailStrategy::ObjectStore => write!(f, "object-store"),
        }
    }
}
