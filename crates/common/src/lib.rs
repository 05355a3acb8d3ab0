//! Catman Common Library
//!
//! Shared code for the Catman services including:
//! - Article XML parsing and schema validation
//! - Database models and the catalog store
//! - The ingestion pipeline: intake, linking, indexing and sweeps
//! - Job queue and search engine clients
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod search;
pub mod xml;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{CatalogStore, Repository};
pub use errors::{AppError, Result};
pub use pipeline::{ArticleStore, Pipeline};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
