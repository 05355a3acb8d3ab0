//! Article ingestion pipeline
//!
//! Provides:
//! - Intake: validation and persistence (`ArticleStore`)
//! - Save events and the hooks that enqueue follow-up jobs
//! - The notification interlock used by internal saves
//! - Linker, indexer and sweeps
//!
//! Every stage is idempotent and safe to retry. An article may sit
//! unlinked or dirty for a while; sweeps bring it back.

mod document;
mod events;
mod indexer;
mod interlock;
mod linker;
mod store;
mod sweeper;

pub use document::{IssueContext, JournalContext, SearchDocument};
pub use events::{ArticleEvents, ArticleSaveHook, ArticleSaved, AuditTrail, ProcessingTrigger};
pub use indexer::{IndexOutcome, Indexer};
pub use interlock::Interlock;
pub use linker::{LinkOutcome, Linker};
pub use store::ArticleStore;
pub use sweeper::{SweepReport, Sweeper};

use crate::config::{SearchConfig, SweeperConfig};
use crate::db::CatalogStore;
use crate::errors::Result;
use crate::queue::{Job, JobQueue};
use crate::search::SearchIndex;
use crate::xml::Schema;
use std::sync::Arc;

/// The wired pipeline sharing one interlock and one event bus
pub struct Pipeline {
    pub interlock: Arc<Interlock>,
    pub articles: Arc<ArticleStore>,
    pub linker: Linker,
    pub indexer: Indexer,
    pub sweeper: Sweeper,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        queue: Arc<dyn JobQueue>,
        search: Arc<dyn SearchIndex>,
        search_config: &SearchConfig,
        sweeper_config: &SweeperConfig,
    ) -> Self {
        let interlock = Arc::new(Interlock::new());
        let events = Arc::new(ArticleEvents::with_default_hooks(
            interlock.clone(),
            queue.clone(),
        ));
        let articles = Arc::new(ArticleStore::new(
            store.clone(),
            Arc::new(Schema::basic_article_meta()),
            interlock.clone(),
            events,
        ));

        Self {
            linker: Linker::new(
                store.clone(),
                articles.clone(),
                interlock.clone(),
                queue.clone(),
            ),
            indexer: Indexer::new(
                store.clone(),
                articles.clone(),
                interlock.clone(),
                search,
                search_config.index_name.clone(),
                search_config.doc_type.clone(),
            ),
            sweeper: Sweeper::new(store, queue, sweeper_config.batch_size),
            interlock,
            articles,
        }
    }

    /// Run one job to completion
    pub async fn run(&self, job: &Job) -> Result<()> {
        match *job {
            Job::LinkToJournal { article_id } => {
                self.linker.link_to_journal(article_id).await?;
            }
            Job::LinkToIssue { article_id } => {
                self.linker.link_to_issue(article_id).await?;
            }
            Job::IndexArticle { article_id } => {
                self.indexer.index_article(article_id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{testing, MemoryStore};
    use crate::queue::MemoryQueue;
    use crate::search::MockSearchIndex;
    use crate::xml::fixtures;

    /// Drains the queue through the pipeline until it is empty
    async fn settle(pipeline: &Pipeline, queue: &MemoryQueue) -> usize {
        let mut ran = 0;
        while let Some(job) = queue.pop().await {
            pipeline.run(&job).await.unwrap();
            ran += 1;
        }
        ran
    }

    #[tokio::test]
    async fn test_article_flows_to_a_clean_linked_state() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let search = Arc::new(MockSearchIndex::new());
        let pipeline = Pipeline::new(
            store.clone(),
            queue.clone(),
            search.clone(),
            &SearchConfig::default(),
            &SweeperConfig::default(),
        );

        let journal = testing::journal(Some("0066-782X"), None);
        let issue = testing::issue(journal.id, "12", "3", 2020);
        store.insert_journal(journal.clone()).await;
        store.insert_issue(issue.clone()).await;

        let aid = pipeline
            .articles
            .create_article(&fixtures::article("0066-782X", "12", "3", "2020"))
            .await
            .unwrap();
        settle(&pipeline, &queue).await;

        let article = pipeline.articles.find_by_aid(&aid).await.unwrap();
        assert_eq!(article.journal_id, Some(journal.id));
        assert_eq!(article.issue_id, Some(issue.id));
        // the issue link landed after the index job ran
        assert!(article.es_is_dirty);

        pipeline.sweeper.sweep_dirty().await.unwrap();
        settle(&pipeline, &queue).await;

        let article = pipeline.articles.find_by_aid(&aid).await.unwrap();
        assert!(!article.es_is_dirty);
        let last = search.requests().await.pop().unwrap();
        assert_eq!(last.parent.as_deref(), Some(issue.iid.as_str()));
    }

    #[tokio::test]
    async fn test_sweeps_recover_an_article_whose_journal_arrives_late() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let pipeline = Pipeline::new(
            store.clone(),
            queue.clone(),
            Arc::new(MockSearchIndex::new()),
            &SearchConfig::default(),
            &SweeperConfig::default(),
        );

        let aid = pipeline
            .articles
            .create_article(&fixtures::article("0001-3714", "12", "3", "2020"))
            .await
            .unwrap();
        settle(&pipeline, &queue).await;
        assert!(pipeline.articles.find_by_aid(&aid).await.unwrap().journal_id.is_none());

        let journal = testing::journal(None, Some("0001-3714"));
        store.insert_journal(journal.clone()).await;
        store.insert_issue(testing::issue(journal.id, "12", "3", 2020)).await;

        let report = pipeline.sweeper.sweep_orphans().await.unwrap();
        assert_eq!(report.enqueued, 1);
        settle(&pipeline, &queue).await;

        let article = pipeline.articles.find_by_aid(&aid).await.unwrap();
        assert_eq!(article.journal_id, Some(journal.id));
        assert!(article.issue_id.is_some());
    }
}
