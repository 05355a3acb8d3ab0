//! SeaORM entity models
//!
//! Articles are written by the pipeline; journals and issues are read-only.

mod article;
mod issue;
mod journal;

pub use article::{
    ActiveModel as ArticleActiveModel, Column as ArticleColumn, Entity as ArticleEntity,
    Model as Article,
};

pub use journal::{
    ActiveModel as JournalActiveModel, Column as JournalColumn, Entity as JournalEntity,
    Model as Journal,
};

pub use issue::{
    ActiveModel as IssueActiveModel, Column as IssueColumn, Entity as IssueEntity,
    Model as Issue,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Partial update of an article's mutable fields.
///
/// `None` leaves a field untouched. The XML and identity columns are
/// not updatable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleUpdate {
    pub journal_id: Option<Uuid>,
    pub issue_id: Option<Uuid>,
    pub es_is_dirty: Option<bool>,
    pub es_updated_at: Option<DateTime<Utc>>,
    /// Only apply when `updated_at` still equals this value
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl ArticleUpdate {
    /// Attach a journal; the search copy is stale afterwards
    pub fn link_journal(journal_id: Uuid) -> Self {
        Self {
            journal_id: Some(journal_id),
            es_is_dirty: Some(true),
            ..Default::default()
        }
    }

    /// Attach an issue; the search copy is stale afterwards
    pub fn link_issue(issue_id: Uuid) -> Self {
        Self {
            issue_id: Some(issue_id),
            es_is_dirty: Some(true),
            ..Default::default()
        }
    }

    /// Record a confirmed index write of the version loaded at `loaded_at`
    pub fn mark_clean(indexed_at: DateTime<Utc>, loaded_at: DateTime<Utc>) -> Self {
        Self {
            es_is_dirty: Some(false),
            es_updated_at: Some(indexed_at),
            if_unmodified_since: Some(loaded_at),
            ..Default::default()
        }
    }
}
