//! Linker: attach articles to their journal, then to their issue
//!
//! Both jobs start with a conditional load ("still unlinked?") and so
//! are safe to run any number of times for the same article. A missing
//! match is not an error: the article stays pending until a sweep
//! re-enqueues it.

use super::{ArticleStore, Interlock};
use crate::db::models::ArticleUpdate;
use crate::db::CatalogStore;
use crate::errors::Result;
use crate::metrics;
use crate::queue::{Job, JobQueue};
use crate::xml::{ArticleXml, XPaths};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What a linker run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Already linked, ahead-of-print, or gone: nothing to do
    Skipped,
    /// Linked to the journal or issue with this id
    Linked(Uuid),
    /// No candidate yet; left pending
    NoMatch,
    /// `linkToIssue` ran before the journal was linked
    MissingJournal,
}

impl LinkOutcome {
    fn label(&self) -> &'static str {
        match self {
            LinkOutcome::Skipped => "skipped",
            LinkOutcome::Linked(_) => "linked",
            LinkOutcome::NoMatch => "no_match",
            LinkOutcome::MissingJournal => "missing_journal",
        }
    }
}

pub struct Linker {
    store: Arc<dyn CatalogStore>,
    articles: Arc<ArticleStore>,
    interlock: Arc<Interlock>,
    queue: Arc<dyn JobQueue>,
}

impl Linker {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        articles: Arc<ArticleStore>,
        interlock: Arc<Interlock>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            store,
            articles,
            interlock,
            queue,
        }
    }

    /// Attach the article to the journal matching its ISSNs, trying the
    /// print and electronic ISSNs swapped when the direct lookup fails.
    /// On success `linkToIssue` is enqueued.
    #[instrument(skip(self))]
    pub async fn link_to_journal(&self, article_id: Uuid) -> Result<LinkOutcome> {
        let outcome = self.try_link_to_journal(article_id).await?;
        metrics::record_link("journal", outcome.label());
        Ok(outcome)
    }

    async fn try_link_to_journal(&self, article_id: Uuid) -> Result<LinkOutcome> {
        let Some(article) = self.store.find_article_without_journal(article_id).await? else {
            info!("Article already linked to a journal or missing");
            return Ok(LinkOutcome::Skipped);
        };

        let ppub = article.issn_ppub.as_deref();
        let epub = article.issn_epub.as_deref();

        let journal = match self.store.find_journal_by_issn(ppub, epub).await? {
            Some(journal) => Some(journal),
            // source data sometimes transposes the two ISSNs
            None => self.store.find_journal_by_issn(epub, ppub).await?,
        };
        let Some(journal) = journal else {
            info!(ppub, epub, "No journal matches the article's ISSNs yet");
            return Ok(LinkOutcome::NoMatch);
        };

        let update = ArticleUpdate::link_journal(journal.id);
        let saved = self
            .interlock
            .with_suspended_notifications(|| self.articles.save_article(article.id, &update))
            .await?;
        if saved.is_none() {
            return Ok(LinkOutcome::Skipped);
        }
        info!(journal_id = %journal.id, jid = %journal.jid, "Article linked to journal");

        // the orphan sweep re-enqueues it if this send is lost
        if let Err(e) = self.queue.enqueue(&Job::LinkToIssue { article_id }).await {
            warn!(error = %e, "Failed to enqueue issue linking");
        }

        Ok(LinkOutcome::Linked(journal.id))
    }

    /// Attach the article to the issue of its journal with the same
    /// volume, number and year. Ahead-of-print articles are never linked.
    #[instrument(skip(self))]
    pub async fn link_to_issue(&self, article_id: Uuid) -> Result<LinkOutcome> {
        let outcome = self.try_link_to_issue(article_id).await?;
        metrics::record_link("issue", outcome.label());
        Ok(outcome)
    }

    async fn try_link_to_issue(&self, article_id: Uuid) -> Result<LinkOutcome> {
        let Some(article) = self.store.find_article_without_issue(article_id).await? else {
            info!("Article already linked to an issue, ahead-of-print or missing");
            return Ok(LinkOutcome::Skipped);
        };

        let Some(journal_id) = article.journal_id else {
            info!("Article has no journal yet");
            return Ok(LinkOutcome::MissingJournal);
        };

        let doc = ArticleXml::parse(&article.xml)?;
        let volume = doc.value(XPaths::VOLUME);
        let number = doc.value(XPaths::ISSUE);
        let Some(year) = doc
            .value(XPaths::YEAR)
            .and_then(|year| year.parse::<i32>().ok())
        else {
            info!("Article has no usable publication year");
            return Ok(LinkOutcome::NoMatch);
        };

        let issue = self
            .store
            .find_matching_issue(journal_id, volume.as_deref(), number.as_deref(), year)
            .await?;
        let Some(issue) = issue else {
            info!(?volume, ?number, year, "No issue matches the article yet");
            return Ok(LinkOutcome::NoMatch);
        };

        let update = ArticleUpdate::link_issue(issue.id);
        let saved = self
            .interlock
            .with_suspended_notifications(|| self.articles.save_article(article.id, &update))
            .await?;
        if saved.is_none() {
            return Ok(LinkOutcome::Skipped);
        }

        info!(issue_id = %issue.id, iid = %issue.iid, "Article linked to issue");
        Ok(LinkOutcome::Linked(issue.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{testing, MemoryStore};
    use crate::pipeline::ArticleEvents;
    use crate::queue::MemoryQueue;
    use crate::xml::{fixtures, Schema};

    struct Harness {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        articles: Arc<ArticleStore>,
        linker: Linker,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
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
        let linker = Linker::new(store.clone(), articles.clone(), interlock, queue.clone());
        Harness {
            store,
            queue,
            articles,
            linker,
        }
    }

    impl Harness {
        async fn create(&self, xml: &str) -> Uuid {
            let aid = self.articles.create_article(xml).await.unwrap();
            let id = self.articles.find_by_aid(&aid).await.unwrap().id;
            self.queue.drain().await;
            id
        }

        async fn journal_of(&self, id: Uuid) -> Option<Uuid> {
            self.store.find_article(id).await.unwrap().unwrap().journal_id
        }

        async fn issue_of(&self, id: Uuid) -> Option<Uuid> {
            self.store.find_article(id).await.unwrap().unwrap().issue_id
        }
    }

    #[tokio::test]
    async fn test_links_by_print_issn_and_enqueues_issue_linking() {
        let h = harness();
        let journal = testing::journal(Some("0066-782X"), None);
        h.store.insert_journal(journal.clone()).await;
        let id = h.create(&fixtures::article("0066-782X", "114", "3", "2020")).await;

        let outcome = h.linker.link_to_journal(id).await.unwrap();

        assert_eq!(outcome, LinkOutcome::Linked(journal.id));
        assert_eq!(h.journal_of(id).await, Some(journal.id));
        // internal save: only the explicit follow-up, no re-triggered chain
        assert_eq!(h.queue.drain().await, vec![Job::LinkToIssue { article_id: id }]);
    }

    #[tokio::test]
    async fn test_transposed_issn_matches_after_journal_appears() {
        let h = harness();
        let id = h.create(&fixtures::article("0001-3714", "12", "3", "2020")).await;
        let before = h.store.find_article(id).await.unwrap().unwrap();
        assert!(before.es_is_dirty);

        assert_eq!(h.linker.link_to_journal(id).await.unwrap(), LinkOutcome::NoMatch);
        assert_eq!(h.journal_of(id).await, None);
        assert!(h.queue.is_empty().await);

        // the fixture's own e-ISSN is 1678-4170, so only the swapped lookup can match
        let journal = testing::journal(None, Some("0001-3714"));
        h.store.insert_journal(journal.clone()).await;

        assert_eq!(
            h.linker.link_to_journal(id).await.unwrap(),
            LinkOutcome::Linked(journal.id)
        );
        assert_eq!(h.journal_of(id).await, Some(journal.id));
    }

    #[tokio::test]
    async fn test_link_to_journal_is_idempotent() {
        let h = harness();
        let journal = testing::journal(Some("0066-782X"), None);
        h.store.insert_journal(journal.clone()).await;
        let id = h.create(&fixtures::article("0066-782X", "114", "3", "2020")).await;

        h.linker.link_to_journal(id).await.unwrap();
        let once = h.store.find_article(id).await.unwrap().unwrap();
        h.queue.drain().await;

        assert_eq!(h.linker.link_to_journal(id).await.unwrap(), LinkOutcome::Skipped);
        assert_eq!(h.store.find_article(id).await.unwrap().unwrap(), once);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_match_twice_leaves_identical_state() {
        let h = harness();
        let id = h.create(&fixtures::article("0001-3714", "12", "3", "2020")).await;
        let initial = h.store.find_article(id).await.unwrap().unwrap();

        h.linker.link_to_journal(id).await.unwrap();
        h.linker.link_to_journal(id).await.unwrap();

        assert_eq!(h.store.find_article(id).await.unwrap().unwrap(), initial);
    }

    #[tokio::test]
    async fn test_links_matching_issue_then_skips() {
        let h = harness();
        let journal = testing::journal(Some("0066-782X"), None);
        let issue = testing::issue(journal.id, "12", "3", 2020);
        h.store.insert_journal(journal.clone()).await;
        h.store.insert_issue(testing::issue(journal.id, "12", "4", 2020)).await;
        h.store.insert_issue(issue.clone()).await;
        let id = h.create(&fixtures::article("0066-782X", "12", "3", "2020")).await;
        h.linker.link_to_journal(id).await.unwrap();

        assert_eq!(
            h.linker.link_to_issue(id).await.unwrap(),
            LinkOutcome::Linked(issue.id)
        );
        assert_eq!(h.issue_of(id).await, Some(issue.id));
        assert!(h.store.find_article(id).await.unwrap().unwrap().es_is_dirty);

        assert_eq!(h.linker.link_to_issue(id).await.unwrap(), LinkOutcome::Skipped);
        assert_eq!(h.issue_of(id).await, Some(issue.id));
    }

    #[tokio::test]
    async fn test_issue_linking_waits_for_journal() {
        let h = harness();
        let id = h.create(&fixtures::article("0066-782X", "12", "3", "2020")).await;

        assert_eq!(
            h.linker.link_to_issue(id).await.unwrap(),
            LinkOutcome::MissingJournal
        );
        assert_eq!(h.issue_of(id).await, None);
    }

    #[tokio::test]
    async fn test_issue_without_match_is_left_pending() {
        let h = harness();
        let journal = testing::journal(Some("0066-782X"), None);
        h.store.insert_journal(journal.clone()).await;
        h.store.insert_issue(testing::issue(journal.id, "12", "3", 2019)).await;
        let id = h.create(&fixtures::article("0066-782X", "12", "3", "2020")).await;
        h.linker.link_to_journal(id).await.unwrap();

        assert_eq!(h.linker.link_to_issue(id).await.unwrap(), LinkOutcome::NoMatch);
        assert_eq!(h.issue_of(id).await, None);
    }

    #[tokio::test]
    async fn test_ahead_of_print_articles_never_get_an_issue() {
        let h = harness();
        let journal = testing::journal(None, Some("1519-6984"));
        h.store.insert_journal(journal.clone()).await;
        // an issue with empty volume and number would otherwise match
        h.store.insert_issue(testing::issue(journal.id, "", "", 2021)).await;
        let id = h.create(&fixtures::aop_article("1519-6984")).await;

        assert_eq!(
            h.linker.link_to_journal(id).await.unwrap(),
            LinkOutcome::Linked(journal.id)
        );
        assert_eq!(h.linker.link_to_issue(id).await.unwrap(), LinkOutcome::Skipped);
        assert_eq!(h.issue_of(id).await, None);
    }

    #[tokio::test]
    async fn test_missing_article_is_skipped() {
        let h = harness();
        assert_eq!(
            h.linker.link_to_journal(Uuid::new_v4()).await.unwrap(),
            LinkOutcome::Skipped
        );
        assert_eq!(
            h.linker.link_to_issue(Uuid::new_v4()).await.unwrap(),
            LinkOutcome::Skipped
        );
    }
}
