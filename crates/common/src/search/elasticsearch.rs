//! Elasticsearch document client

use super::{IndexRequest, IndexResponse, SearchIndex};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Client over a list of equivalent nodes.
///
/// Each request starts at the next node in turn and fails over to the
/// following ones on transport errors. HTTP error responses are not
/// retried on other nodes.
pub struct ElasticsearchClient {
    client: reqwest::Client,
    nodes: Vec<String>,
    next: AtomicUsize,
}

#[derive(Deserialize)]
struct IndexResult {
    #[serde(rename = "_version", default)]
    version: i64,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let nodes: Vec<String> = config
            .nodes
            .iter()
            .map(|node| node.trim().trim_end_matches('/').to_string())
            .filter(|node| !node.is_empty())
            .collect();

        if nodes.is_empty() {
            return Err(AppError::Configuration {
                message: "search.nodes must list at least one node".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            nodes,
            next: AtomicUsize::new(0),
        })
    }

    fn document_url(node: &str, request: &IndexRequest) -> String {
        format!(
            "{}/{}/{}/{}",
            node, request.index, request.doc_type, request.id
        )
    }

    async fn put(
        &self,
        node: &str,
        request: &IndexRequest,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .put(Self::document_url(node, request))
            .json(&request.body);
        if let Some(parent) = &request.parent {
            builder = builder.query(&[("parent", parent)]);
        }
        builder.send().await
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let mut last_error = None;

        for offset in 0..self.nodes.len() {
            let node = &self.nodes[(start + offset) % self.nodes.len()];

            let response = match self.put(node, &request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(node = %node, error = %e, "Search node unreachable, trying next");
                    last_error = Some(e);
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::SearchEngine {
                    message: format!("{} rejected document {}: {} {}", node, request.id, status, body),
                });
            }

            let result: IndexResult = response.json().await.map_err(|e| AppError::SearchEngine {
                message: format!("Failed to parse index response: {}", e),
            })?;

            debug!(id = %request.id, version = result.version, "Document indexed");
            return Ok(IndexResponse {
                version: result.version,
            });
        }

        Err(AppError::SearchEngine {
            message: match last_error {
                Some(e) => format!("No search node reachable: {}", e),
                None => "No search node configured".to_string(),
            },
        })
    }
}
