//! In-memory catalog store for tests and local runs

use crate::db::models::{Article, ArticleUpdate, Issue, Journal};
use crate::db::store::CatalogStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Duration;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    articles: BTreeMap<Uuid, Article>,
    journals: BTreeMap<Uuid, Journal>,
    issues: BTreeMap<Uuid, Issue>,
}

/// [`CatalogStore`] over ordered maps
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a journal (normally owned by the CRUD application)
    pub async fn insert_journal(&self, journal: Journal) {
        self.tables.write().await.journals.insert(journal.id, journal);
    }

    /// Add or replace an issue (normally owned by the CRUD application)
    pub async fn insert_issue(&self, issue: Issue) {
        self.tables.write().await.issues.insert(issue.id, issue);
    }

    pub async fn article_count(&self) -> usize {
        self.tables.read().await.articles.len()
    }
}

fn next_batch<'a>(
    articles: impl Iterator<Item = &'a Article>,
    after: Option<Uuid>,
    limit: u64,
) -> Vec<Article> {
    articles
        .filter(|article| after.map_or(true, |after| article.id > after))
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_article(&self, article: Article) -> Result<Article> {
        let mut tables = self.tables.write().await;

        let conflict = tables.articles.values().find_map(|existing| {
            if existing.id == article.id {
                Some("id")
            } else if existing.aid == article.aid {
                Some("aid")
            } else if existing.domain_key == article.domain_key {
                Some("domain_key")
            } else {
                None
            }
        });
        if let Some(column) = conflict {
            return Err(AppError::Duplicate {
                message: format!("articles.{} already exists", column),
            });
        }

        tables.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.tables.read().await.articles.get(&id).cloned())
    }

    async fn find_article_by_aid(&self, aid: &str) -> Result<Option<Article>> {
        Ok(self
            .tables
            .read()
            .await
            .articles
            .values()
            .find(|article| article.aid == aid)
            .cloned())
    }

    async fn find_article_without_journal(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self
            .find_article(id)
            .await?
            .filter(|article| article.journal_id.is_none()))
    }

    async fn find_article_without_issue(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self
            .find_article(id)
            .await?
            .filter(|article| article.issue_id.is_none() && !article.is_aop))
    }

    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<Option<Article>> {
        let mut tables = self.tables.write().await;
        let Some(article) = tables.articles.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(since) = update.if_unmodified_since {
            if article.updated_at != DateTimeWithTimeZone::from(since) {
                return Ok(None);
            }
        }

        if let Some(journal_id) = update.journal_id {
            article.journal_id = Some(journal_id);
        }
        if let Some(issue_id) = update.issue_id {
            article.issue_id = Some(issue_id);
        }
        if let Some(dirty) = update.es_is_dirty {
            article.es_is_dirty = dirty;
        }
        if let Some(indexed_at) = update.es_updated_at {
            article.es_updated_at = Some(indexed_at.into());
        }

        // strictly increasing, so conditional updates see every write
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let floor = article.updated_at + Duration::microseconds(1);
        article.updated_at = now.max(floor);

        Ok(Some(article.clone()))
    }

    async fn find_journal(&self, id: Uuid) -> Result<Option<Journal>> {
        Ok(self.tables.read().await.journals.get(&id).cloned())
    }

    async fn find_journal_by_issn(
        &self,
        print_issn: Option<&str>,
        electronic_issn: Option<&str>,
    ) -> Result<Option<Journal>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Journal> = tables
            .journals
            .values()
            .filter(|journal| {
                let print = print_issn.is_some() && journal.print_issn.as_deref() == print_issn;
                let electronic = electronic_issn.is_some()
                    && journal.electronic_issn.as_deref() == electronic_issn;
                print || electronic
            })
            .collect();
        matches.sort_by_key(|journal| journal.created_at);

        Ok(matches.first().map(|journal| (*journal).clone()))
    }

    async fn find_issue(&self, id: Uuid) -> Result<Option<Issue>> {
        Ok(self.tables.read().await.issues.get(&id).cloned())
    }

    async fn find_matching_issue(
        &self,
        journal_id: Uuid,
        volume: Option<&str>,
        number: Option<&str>,
        year: i32,
    ) -> Result<Option<Issue>> {
        let volume = volume.unwrap_or_default();
        let number = number.unwrap_or_default();

        let tables = self.tables.read().await;
        let mut matches: Vec<&Issue> = tables
            .issues
            .values()
            .filter(|issue| {
                issue.journal_id == journal_id
                    && issue.volume == volume
                    && issue.number == number
                    && issue.publication_year == year
            })
            .collect();
        matches.sort_by_key(|issue| issue.created_at);

        Ok(matches.first().map(|issue| (*issue).clone()))
    }

    async fn articles_without_issue(
        &self,
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<Article>> {
        let tables = self.tables.read().await;
        Ok(next_batch(
            tables.articles.values().filter(|a| a.issue_id.is_none()),
            after,
            limit,
        ))
    }

    async fn dirty_articles(&self, after: Option<Uuid>, limit: u64) -> Result<Vec<Article>> {
        let tables = self.tables.read().await;
        Ok(next_batch(
            tables.articles.values().filter(|a| a.es_is_dirty),
            after,
            limit,
        ))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
