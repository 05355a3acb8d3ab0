//! Periodic sweeps re-enqueueing work lost between saves and jobs
//!
//! Sweeps only enqueue. Jobs re-check article state when they run, so
//! overlapping sweeps or a sweep racing a regular trigger are harmless.

use crate::db::models::Article;
use crate::db::CatalogStore;
use crate::errors::Result;
use crate::metrics;
use crate::queue::{Job, JobQueue};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub enqueued: usize,
}

pub struct Sweeper {
    store: Arc<dyn CatalogStore>,
    queue: Arc<dyn JobQueue>,
    batch_size: u64,
}

impl Sweeper {
    pub fn new(store: Arc<dyn CatalogStore>, queue: Arc<dyn JobQueue>, batch_size: u64) -> Self {
        Self {
            store,
            queue,
            batch_size: batch_size.max(1),
        }
    }

    /// Enqueue linking for every article still missing its journal or
    /// its issue. Ahead-of-print articles get `LinkToIssue` too; the job
    /// leaves them alone.
    #[instrument(skip(self))]
    pub async fn sweep_orphans(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut after: Option<Uuid> = None;

        loop {
            let batch = self.store.articles_without_issue(after, self.batch_size).await?;
            let Some(last) = batch.last() else { break };
            after = Some(last.id);

            for article in &batch {
                report.scanned += 1;
                if let Some(job) = orphan_job(article) {
                    self.queue.enqueue(&job).await?;
                    report.enqueued += 1;
                }
            }
        }

        info!(scanned = report.scanned, enqueued = report.enqueued, "Orphan sweep finished");
        metrics::record_sweep("orphans", report.enqueued);
        Ok(report)
    }

    /// Enqueue indexing for every dirty article
    #[instrument(skip(self))]
    pub async fn sweep_dirty(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut after: Option<Uuid> = None;

        loop {
            let batch = self.store.dirty_articles(after, self.batch_size).await?;
            let Some(last) = batch.last() else { break };
            after = Some(last.id);

            for article in &batch {
                report.scanned += 1;
                self.queue
                    .enqueue(&Job::IndexArticle {
                        article_id: article.id,
                    })
                    .await?;
                report.enqueued += 1;
            }
        }

        info!(scanned = report.scanned, enqueued = report.enqueued, "Dirty sweep finished");
        metrics::record_sweep("dirty", report.enqueued);
        Ok(report)
    }
}

fn orphan_job(article: &Article) -> Option<Job> {
    let article_id = article.id;
    if article.journal_id.is_none() {
        Some(Job::LinkToJournal { article_id })
    } else if article.issue_id.is_none() {
        Some(Job::LinkToIssue { article_id })
    } else {
        None
    }
}
