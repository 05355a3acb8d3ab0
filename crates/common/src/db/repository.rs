//! Repository pattern for database operations
//!
//! SeaORM implementation of [`CatalogStore`]. Reads go to the replica
//! when one is configured, except reads that follow a write.

use crate::db::models::*;
use crate::db::store::CatalogStore;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

/// Repository for data access operations
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

/// Unique violations on insert are duplicates, not database failures
fn insert_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Duplicate { message: detail },
        _ => err.into(),
    }
}

#[async_trait]
impl CatalogStore for Repository {
    // ========================================================================
    // Article Operations
    // ========================================================================

    async fn insert_article(&self, article: Article) -> Result<Article> {
        let model = ArticleActiveModel {
            id: Set(article.id),
            aid: Set(article.aid),
            domain_key: Set(article.domain_key),
            xml: Set(article.xml),
            xml_version: Set(article.xml_version),
            issn_ppub: Set(article.issn_ppub),
            issn_epub: Set(article.issn_epub),
            article_type: Set(article.article_type),
            is_aop: Set(article.is_aop),
            journal_id: Set(article.journal_id),
            issue_id: Set(article.issue_id),
            es_is_dirty: Set(article.es_is_dirty),
            es_updated_at: Set(article.es_updated_at),
            created_at: Set(article.created_at),
            updated_at: Set(article.updated_at),
        };

        model.insert(self.write_conn()).await.map_err(insert_error)
    }

    // jobs load their article right after it is created; a lagging
    // replica would report it missing
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_article_by_aid(&self, aid: &str) -> Result<Option<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Aid.eq(aid))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_article_without_journal(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .filter(ArticleColumn::JournalId.is_null())
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_article_without_issue(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .filter(ArticleColumn::IssueId.is_null())
            .filter(ArticleColumn::IsAop.eq(false))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<Option<Article>> {
        let now = chrono::Utc::now();

        let mut query = ArticleEntity::update_many()
            .col_expr(
                ArticleColumn::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(now)),
            )
            .filter(ArticleColumn::Id.eq(id));

        if let Some(journal_id) = update.journal_id {
            query = query.col_expr(ArticleColumn::JournalId, Expr::value(journal_id));
        }
        if let Some(issue_id) = update.issue_id {
            query = query.col_expr(ArticleColumn::IssueId, Expr::value(issue_id));
        }
        if let Some(dirty) = update.es_is_dirty {
            query = query.col_expr(ArticleColumn::EsIsDirty, Expr::value(dirty));
        }
        if let Some(indexed_at) = update.es_updated_at {
            query = query.col_expr(
                ArticleColumn::EsUpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(indexed_at)),
            );
        }
        if let Some(since) = update.if_unmodified_since {
            query = query.filter(
                ArticleColumn::UpdatedAt.eq(DateTimeWithTimeZone::from(since)),
            );
        }

        let result = query.exec(self.write_conn()).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        ArticleEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn articles_without_issue(
        &self,
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<Article>> {
        let mut query = ArticleEntity::find().filter(ArticleColumn::IssueId.is_null());
        if let Some(after) = after {
            query = query.filter(ArticleColumn::Id.gt(after));
        }

        query
            .order_by_asc(ArticleColumn::Id)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn dirty_articles(&self, after: Option<Uuid>, limit: u64) -> Result<Vec<Article>> {
        let mut query = ArticleEntity::find().filter(ArticleColumn::EsIsDirty.eq(true));
        if let Some(after) = after {
            query = query.filter(ArticleColumn::Id.gt(after));
        }

        query
            .order_by_asc(ArticleColumn::Id)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Journal / Issue Operations
    // ========================================================================

    async fn find_journal(&self, id: Uuid) -> Result<Option<Journal>> {
        JournalEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_journal_by_issn(
        &self,
        print_issn: Option<&str>,
        electronic_issn: Option<&str>,
    ) -> Result<Option<Journal>> {
        let mut condition = Condition::any();
        if let Some(issn) = print_issn {
            condition = condition.add(JournalColumn::PrintIssn.eq(issn));
        }
        if let Some(issn) = electronic_issn {
            condition = condition.add(JournalColumn::ElectronicIssn.eq(issn));
        }
        if condition.is_empty() {
            return Ok(None);
        }

        JournalEntity::find()
            .filter(condition)
            .order_by_asc(JournalColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_issue(&self, id: Uuid) -> Result<Option<Issue>> {
        IssueEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_matching_issue(
        &self,
        journal_id: Uuid,
        volume: Option<&str>,
        number: Option<&str>,
        year: i32,
    ) -> Result<Option<Issue>> {
        IssueEntity::find()
            .filter(IssueColumn::JournalId.eq(journal_id))
            .filter(IssueColumn::Volume.eq(volume.unwrap_or_default()))
            .filter(IssueColumn::Number.eq(number.unwrap_or_default()))
            .filter(IssueColumn::PublicationYear.eq(year))
            .order_by_asc(IssueColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
