//! Queue message processor
//!
//! Runs the job carried by one queue message and decides what happens
//! to the message afterwards.

use aws_sdk_sqs::types::Message;
use catman_common::{metrics, queue::Queue, Pipeline};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What to do with a message once processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The job ran; delete the message
    Completed,
    /// The job failed; leave the message for redelivery or the DLQ
    Retry,
    /// Not a job; forward to the DLQ and delete
    Discard,
}

pub struct JobProcessor {
    pipeline: Arc<Pipeline>,
}

impl JobProcessor {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[instrument(skip_all, fields(message_id = message.message_id().unwrap_or("-")))]
    pub async fn process(&self, message: &Message) -> Disposition {
        let job = match Queue::parse_message(message) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable message");
                metrics::record_queue_message("unknown", "discarded");
                return Disposition::Discard;
            }
        };

        info!(task = job.kind(), article_id = %job.article_id(), "Received job");

        match self.pipeline.run(&job).await {
            Ok(()) => {
                metrics::record_queue_message(job.kind(), "completed");
                Disposition::Completed
            }
            Err(e) => {
                error!(
                    task = job.kind(),
                    article_id = %job.article_id(),
                    error = %e,
                    "Job failed"
                );
                metrics::record_queue_message(job.kind(), "failed");
                Disposition::Retry
            }
        }
    }
}
