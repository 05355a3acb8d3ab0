//! Article save events
//!
//! Every save made through the Article Store is published to the hooks
//! registered here, unless the [`Interlock`] has notifications
//! suspended. Hooks are registered explicitly at start-up.

use super::Interlock;
use crate::db::models::Article;
use crate::errors::Result;
use crate::metrics;
use crate::queue::{Job, JobQueue};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A completed article save
#[derive(Debug, Clone)]
pub struct ArticleSaved {
    pub article: Article,
    /// First save of this article
    pub created: bool,
}

/// Subscriber to article saves
#[async_trait]
pub trait ArticleSaveHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_save(&self, event: &ArticleSaved) -> Result<()>;
}

pub struct ArticleEvents {
    interlock: Arc<Interlock>,
    hooks: Vec<Arc<dyn ArticleSaveHook>>,
}

impl ArticleEvents {
    pub fn new(interlock: Arc<Interlock>) -> Self {
        Self {
            interlock,
            hooks: Vec::new(),
        }
    }

    /// The hooks every deployment runs: processing trigger and audit trail
    pub fn with_default_hooks(interlock: Arc<Interlock>, queue: Arc<dyn JobQueue>) -> Self {
        let mut events = Self::new(interlock);
        events.subscribe(Arc::new(ProcessingTrigger::new(queue)));
        events.subscribe(Arc::new(AuditTrail));
        events
    }

    pub fn subscribe(&mut self, hook: Arc<dyn ArticleSaveHook>) {
        debug!(hook = hook.name(), "Article save hook registered");
        self.hooks.push(hook);
    }

    /// Whether a save made now would be delivered to the hooks
    pub fn enabled(&self) -> bool {
        self.interlock.notifications_enabled()
    }

    /// Deliver `event` if notifications are enabled.
    /// Returns the number of hooks that ran.
    pub async fn publish(&self, event: ArticleSaved) -> usize {
        if !self.enabled() {
            debug!(aid = %event.article.aid, "Notifications suspended, save not published");
            return 0;
        }
        self.dispatch(event).await
    }

    /// Deliver `event` unconditionally. Hook failures are logged and
    /// never reach the caller.
    pub async fn dispatch(&self, event: ArticleSaved) -> usize {
        let results = join_all(self.hooks.iter().map(|hook| {
            let event = &event;
            async move { (hook.name(), hook.on_save(event).await) }
        }))
        .await;

        for (hook, result) in &results {
            if let Err(e) = result {
                warn!(hook, aid = %event.article.aid, error = %e, "Article save hook failed");
            }
        }

        results.len()
    }
}

/// Enqueues the pipeline work a saved article still needs
pub struct ProcessingTrigger {
    queue: Arc<dyn JobQueue>,
}

impl ProcessingTrigger {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Jobs implied by the article's linkage and index state
    pub fn jobs_for(article: &Article) -> Vec<Job> {
        let article_id = article.id;
        let mut jobs = Vec::with_capacity(2);

        if article.needs_journal() {
            jobs.push(Job::LinkToJournal { article_id });
        } else if article.needs_issue() {
            jobs.push(Job::LinkToIssue { article_id });
        }
        if article.es_is_dirty {
            jobs.push(Job::IndexArticle { article_id });
        }
        jobs
    }
}

#[async_trait]
impl ArticleSaveHook for ProcessingTrigger {
    fn name(&self) -> &'static str {
        "processing_trigger"
    }

    async fn on_save(&self, event: &ArticleSaved) -> Result<()> {
        for job in Self::jobs_for(&event.article) {
            self.queue.enqueue(&job).await?;
        }
        Ok(())
    }
}

/// Structured audit log line per save
pub struct AuditTrail;

#[async_trait]
impl ArticleSaveHook for AuditTrail {
    fn name(&self) -> &'static str {
        "audit_trail"
    }

    async fn on_save(&self, event: &ArticleSaved) -> Result<()> {
        let article = &event.article;
        info!(
            aid = %article.aid,
            created = event.created,
            journal_id = ?article.journal_id,
            issue_id = ?article.issue_id,
            dirty = article.es_is_dirty,
            "Article saved"
        );
        metrics::record_article_saved(event.created);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;
    use crate::errors::AppError;
    use crate::queue::MemoryQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArticleSaveHook for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn on_save(&self, _event: &ArticleSaved) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ArticleSaveHook for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn on_save(&self, _event: &ArticleSaved) -> Result<()> {
            Err(AppError::Internal {
                message: "hook failed".to_string(),
            })
        }
    }

    fn saved(article: Article) -> ArticleSaved {
        ArticleSaved {
            article,
            created: false,
        }
    }

    #[tokio::test]
    async fn test_suspended_saves_are_not_published() {
        let interlock = Arc::new(Interlock::new());
        let counting = Arc::new(Counting::default());
        let mut events = ArticleEvents::new(interlock.clone());
        events.subscribe(counting.clone());

        assert_eq!(events.publish(saved(testing::article("k"))).await, 1);

        let delivered = interlock
            .with_suspended_notifications(|| events.publish(saved(testing::article("k"))))
            .await;
        assert_eq!(delivered, 0);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_the_others() {
        let counting = Arc::new(Counting::default());
        let mut events = ArticleEvents::new(Arc::new(Interlock::new()));
        events.subscribe(Arc::new(Broken));
        events.subscribe(counting.clone());

        assert_eq!(events.publish(saved(testing::article("k"))).await, 2);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trigger_jobs_follow_article_state() {
        let mut article = testing::article("k");
        let id = article.id;
        assert_eq!(
            ProcessingTrigger::jobs_for(&article),
            vec![
                Job::LinkToJournal { article_id: id },
                Job::IndexArticle { article_id: id }
            ]
        );

        article.journal_id = Some(Uuid::new_v4());
        article.es_is_dirty = false;
        assert_eq!(
            ProcessingTrigger::jobs_for(&article),
            vec![Job::LinkToIssue { article_id: id }]
        );

        article.is_aop = true;
        assert!(ProcessingTrigger::jobs_for(&article).is_empty());

        article.is_aop = false;
        article.issue_id = Some(Uuid::new_v4());
        assert!(ProcessingTrigger::jobs_for(&article).is_empty());
    }

    #[tokio::test]
    async fn test_default_hooks_enqueue_processing() {
        let queue = Arc::new(MemoryQueue::new());
        let events = ArticleEvents::with_default_hooks(Arc::new(Interlock::new()), queue.clone());
        let article = testing::article("k");
        let id = article.id;

        events
            .publish(ArticleSaved {
                article,
                created: true,
            })
            .await;

        assert_eq!(
            queue.drain().await,
            vec![
                Job::LinkToJournal { article_id: id },
                Job::IndexArticle { article_id: id }
            ]
        );
    }
}
