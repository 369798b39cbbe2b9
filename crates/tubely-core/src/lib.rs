//! Tubely Core Library
//!
//! Domain models, the application error taxonomy, and environment-driven
//! configuration shared by every Tubely crate.

pub mod config;
pub mod error;
pub mod media_types;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, IngestConfig, ServerConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::Video;
pub use storage_types::{StorageBackend, ThumbnailStrategy};
