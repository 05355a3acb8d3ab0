//! Storage seam between the pipeline and the relational store

use crate::db::models::{Article, ArticleUpdate, Issue, Journal};
use crate::errors::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Reads and writes the pipeline needs from the catalog database.
///
/// Implementations must be safe to share between concurrently running
/// jobs.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Persist a new article. A duplicate `aid` or `domain_key` fails
    /// with `AppError::Duplicate`.
    async fn insert_article(&self, article: Article) -> Result<Article>;

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>>;

    async fn find_article_by_aid(&self, aid: &str) -> Result<Option<Article>>;

    /// The article, only while it has no journal
    async fn find_article_without_journal(&self, id: Uuid) -> Result<Option<Article>>;

    /// The article, only while it has no issue and is not ahead-of-print
    async fn find_article_without_issue(&self, id: Uuid) -> Result<Option<Article>>;

    /// Apply a partial update and bump `updated_at`.
    ///
    /// Returns `None` when the article does not exist or when
    /// `if_unmodified_since` no longer matches.
    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<Option<Article>>;

    async fn find_journal(&self, id: Uuid) -> Result<Option<Journal>>;

    /// A journal whose print ISSN equals `print_issn` or whose electronic
    /// ISSN equals `electronic_issn`. Absent arguments match nothing.
    async fn find_journal_by_issn(
        &self,
        print_issn: Option<&str>,
        electronic_issn: Option<&str>,
    ) -> Result<Option<Journal>>;

    async fn find_issue(&self, id: Uuid) -> Result<Option<Issue>>;

    /// The issue of `journal_id` with exactly this volume, number and year.
    /// Absent volume or number match the empty string.
    async fn find_matching_issue(
        &self,
        journal_id: Uuid,
        volume: Option<&str>,
        number: Option<&str>,
        year: i32,
    ) -> Result<Option<Issue>>;

    /// Next batch of articles without an issue, ordered by id, after `after`
    async fn articles_without_issue(&self, after: Option<Uuid>, limit: u64)
        -> Result<Vec<Article>>;

    /// Next batch of dirty articles, ordered by id, after `after`
    async fn dirty_articles(&self, after: Option<Uuid>, limit: u64) -> Result<Vec<Article>>;

    async fn ping(&self) -> Result<()>;
}
