//! Tubely API Library
//!
//! HTTP surface for video and thumbnail ingestion: handlers, authentication,
//! the ingestion coordinator, and application setup.

mod api_doc;
pub mod constants;
mod handlers;
mod telemetry;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod services;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::ingest::{IngestionService, Upload};
pub use state::AppState;
