//! Video metadata store.
//!
//! `VideoRepository` is the contract the ingestion pipeline commits through;
//! `PgVideoRepository` backs it with PostgreSQL and `InMemoryVideoRepository`
//! with a process-local map for tests and local runs.

pub mod memory;
pub mod video;

pub use memory::InMemoryVideoRepository;
pub use video::{PgVideoRepository, UrlColumn, VideoRepository};
