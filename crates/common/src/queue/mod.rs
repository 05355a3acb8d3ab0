//! Job queue for the asynchronous pipeline steps
//!
//! Provides:
//! - `Job`, the wire format of `linkToJournal`, `linkToIssue` and `indexArticle`
//! - `JobQueue`, the fire-and-forget enqueue seam
//! - SQS client wrapper with send retry and dead letter forwarding
//! - An in-memory queue for tests and local runs

use crate::config::QueueConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client as SqsClient;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// A unit of pipeline work, addressed by article primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Job {
    LinkToJournal { article_id: Uuid },
    LinkToIssue { article_id: Uuid },
    IndexArticle { article_id: Uuid },
}

impl Job {
    pub fn article_id(&self) -> Uuid {
        match self {
            Job::LinkToJournal { article_id }
            | Job::LinkToIssue { article_id }
            | Job::IndexArticle { article_id } => *article_id,
        }
    }

    /// Task name, as found in the `task` tag and in metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Job::LinkToJournal { .. } => "link_to_journal",
            Job::LinkToIssue { .. } => "link_to_issue",
            Job::IndexArticle { .. } => "index_article",
        }
    }
}

/// Fire-and-forget job submission. Callers never wait for completion.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &Job) -> Result<()>;
}

/// SQS Queue client wrapper
pub struct Queue {
    client: SqsClient,
    url: String,
    dlq_url: Option<String>,
    batch_size: i32,
    wait_time_seconds: i32,
    visibility_timeout: i32,
    send_retry_window: Duration,
}

impl Queue {
    /// Create a new queue client from the shared AWS environment
    pub async fn new(config: &QueueConfig) -> Result<Self> {
        let url = config.url.clone().ok_or_else(|| AppError::Configuration {
            message: "queue.url is required".to_string(),
        })?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_types::region::Region::new(region.clone()));
        }
        let aws_config = loader.load().await;

        Ok(Self::with_client(SqsClient::new(&aws_config), url, config))
    }

    /// Create with an existing SQS client
    pub fn with_client(client: SqsClient, url: String, config: &QueueConfig) -> Self {
        Self {
            client,
            url,
            dlq_url: config.dlq_url.clone(),
            batch_size: config.batch_size.clamp(1, 10) as i32,
            wait_time_seconds: config.poll_timeout_secs.min(20) as i32,
            visibility_timeout: config.visibility_timeout_secs.min(43_200) as i32,
            send_retry_window: Duration::from_secs(config.send_retry_window_secs),
        }
    }

    /// Send a raw body to `queue_url`, retrying transient failures with
    /// exponential backoff until the retry window closes
    async fn send_body(&self, queue_url: &str, body: String) -> Result<String> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.send_retry_window),
            ..Default::default()
        };

        let client = &self.client;
        let body = &body;
        let result = retry(policy, || async move {
            client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %e, "Send to queue failed, retrying");
                    backoff::Error::transient(e)
                })
        })
        .await
        .map_err(|e| AppError::QueueError {
            message: format!("Failed to send message: {}", e),
        })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Receive messages from the queue (long polling)
    pub async fn receive(&self) -> Result<Vec<Message>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(self.batch_size)
            .visibility_timeout(self.visibility_timeout)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Copy a message body to the dead letter queue, if one is configured
    pub async fn dead_letter(&self, message: &Message) -> Result<()> {
        let Some(dlq_url) = &self.dlq_url else {
            return Ok(());
        };
        let body = message.body.clone().unwrap_or_default();
        self.send_body(dlq_url, body).await.map(|_| ())
    }

    /// Parse message body as a job
    pub fn parse_message(message: &Message) -> Result<Job> {
        let body = message.body.as_ref().ok_or_else(|| AppError::QueueError {
            message: "Message has no body".to_string(),
        })?;

        serde_json::from_str(body).map_err(|e| AppError::QueueError {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

#[async_trait]
impl JobQueue for Queue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        let body = serde_json::to_string(job)?;
        self.send_body(&self.url, body).await?;
        debug!(task = job.kind(), article_id = %job.article_id(), "Job enqueued");
        Ok(())
    }
}

/// In-memory FIFO queue
#[derive(Default)]
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the oldest job
    pub async fn pop(&self) -> Option<Job> {
        self.jobs.lock().await.pop_front()
    }

    /// Remove and return every queued job, oldest first
    pub async fn drain(&self) -> Vec<Job> {
        self.jobs.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        self.jobs.lock().await.push_back(*job);
        Ok(())
    }
}
