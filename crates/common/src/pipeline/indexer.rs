//! Indexer: push an article's search document and clear its dirty flag

use super::{ArticleStore, Interlock, SearchDocument};
use crate::db::models::ArticleUpdate;
use crate::db::CatalogStore;
use crate::errors::Result;
use crate::metrics;
use crate::search::{IndexRequest, SearchIndex};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// No such article
    Missing,
    /// Written and marked clean
    Indexed { version: i64 },
    /// The engine reported nothing written; left dirty
    Unresolved { version: i64 },
    /// Written, but the article changed meanwhile; left dirty
    Stale { version: i64 },
}

pub struct Indexer {
    store: Arc<dyn CatalogStore>,
    articles: Arc<ArticleStore>,
    interlock: Arc<Interlock>,
    search: Arc<dyn SearchIndex>,
    index_name: String,
    doc_type: String,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        articles: Arc<ArticleStore>,
        interlock: Arc<Interlock>,
        search: Arc<dyn SearchIndex>,
        index_name: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            articles,
            interlock,
            search,
            index_name: index_name.into(),
            doc_type: doc_type.into(),
        }
    }

    /// Submit the article's document under its `aid`, parented to its
    /// issue when linked. Engine errors propagate and leave the article
    /// dirty so the job is retried.
    #[instrument(skip(self))]
    pub async fn index_article(&self, article_id: Uuid) -> Result<IndexOutcome> {
        let Some(article) = self.store.find_article(article_id).await? else {
            error!("Article to index does not exist");
            metrics::record_index("missing", None);
            return Ok(IndexOutcome::Missing);
        };

        let journal = match article.journal_id {
            Some(id) => self.store.find_journal(id).await?,
            None => None,
        };
        let issue = match article.issue_id {
            Some(id) => self.store.find_issue(id).await?,
            None => None,
        };

        let document = SearchDocument::build(&article, journal.as_ref(), issue.as_ref())?;
        let request = IndexRequest {
            index: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            id: article.aid.clone(),
            body: serde_json::to_value(&document)?,
            parent: issue.map(|issue| issue.iid),
        };

        let start = Instant::now();
        let response = match self.search.index(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_index("failed", Some(start.elapsed().as_secs_f64()));
                return Err(e);
            }
        };
        let elapsed = start.elapsed().as_secs_f64();
        let version = response.version;

        if version <= 0 {
            warn!(version, aid = %article.aid, "Search engine did not store the document");
            metrics::record_index("unresolved", Some(elapsed));
            return Ok(IndexOutcome::Unresolved { version });
        }

        let update = ArticleUpdate::mark_clean(Utc::now(), article.updated_at.with_timezone(&Utc));
        let saved = self
            .interlock
            .with_suspended_notifications(|| self.articles.save_article(article.id, &update))
            .await?;

        if saved.is_none() {
            info!(version, aid = %article.aid, "Article changed while indexing, left dirty");
            metrics::record_index("stale", Some(elapsed));
            return Ok(IndexOutcome::Stale { version });
        }

        info!(version, aid = %article.aid, "Article indexed");
        metrics::record_index("indexed", Some(elapsed));
        Ok(IndexOutcome::Indexed { version })
    }
}
