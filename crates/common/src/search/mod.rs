//! Search engine integration
//!
//! Provides:
//! - `SearchIndex`, the document upsert seam
//! - An Elasticsearch client over a node list
//! - A circuit breaker wrapping any `SearchIndex`
//! - A mock index for tests

mod breaker;
mod elasticsearch;

pub use breaker::CircuitBreaker;
pub use elasticsearch::ElasticsearchClient;

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A document upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub index: String,
    pub doc_type: String,
    pub id: String,
    pub body: serde_json::Value,
    /// Parent document id, for hierarchical queries
    pub parent: Option<String>,
}

/// Outcome reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Stored version counter; non-positive means nothing was written
    pub version: i64,
}

/// Document upsert by id.
///
/// Implementations are shared across concurrently running jobs and must
/// not require per-call locking.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse>;
}

enum MockMode {
    Counting,
    Fixed(i64),
    Failing,
}

/// Mock search index for testing
pub struct MockSearchIndex {
    mode: MockMode,
    versions: Mutex<HashMap<String, i64>>,
    requests: Mutex<Vec<IndexRequest>>,
}

impl MockSearchIndex {
    /// Versions count up per document id, like the real engine
    pub fn new() -> Self {
        Self::with_mode(MockMode::Counting)
    }

    /// Always reports `version`
    pub fn with_version(version: i64) -> Self {
        Self::with_mode(MockMode::Fixed(version))
    }

    /// Every submission fails as if the engine were unreachable
    pub fn failing() -> Self {
        Self::with_mode(MockMode::Failing)
    }

    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            versions: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received, in order
    pub async fn requests(&self) -> Vec<IndexRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockSearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for MockSearchIndex {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse> {
        let id = request.id.clone();
        self.requests.lock().await.push(request);

        let version = match self.mode {
            MockMode::Failing => {
                return Err(AppError::SearchEngine {
                    message: "connection refused".to_string(),
                })
            }
            MockMode::Fixed(version) => version,
            MockMode::Counting => {
                let mut versions = self.versions.lock().await;
                let version = versions.entry(id).or_insert(0);
                *version += 1;
                *version
            }
        };

        Ok(IndexResponse { version })
    }
}
