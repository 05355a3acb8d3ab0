//! Article entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Public identifier assigned at creation
    #[sea_orm(column_type = "Text", unique)]
    pub aid: String,

    /// Content-derived identity, unique across articles
    #[sea_orm(column_type = "Text", unique)]
    pub domain_key: String,

    /// Raw XML as accepted; never updated
    #[sea_orm(column_type = "Text")]
    pub xml: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub xml_version: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub issn_ppub: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub issn_epub: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub article_type: Option<String>,

    /// Ahead-of-print: never linked to an issue
    pub is_aop: bool,

    pub journal_id: Option<Uuid>,

    pub issue_id: Option<Uuid>,

    /// The search-index copy is stale or missing
    pub es_is_dirty: bool,

    /// Last confirmed search-index write
    pub es_updated_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id",
        on_delete = "SetNull"
    )]
    Journal,

    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::IssueId",
        to = "super::issue::Column::Id",
        on_delete = "SetNull"
    )]
    Issue,
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Waiting for `linkToJournal`
    pub fn needs_journal(&self) -> bool {
        self.journal_id.is_none()
    }

    /// Waiting for `linkToIssue`: journal known, issue not, and not AOP
    pub fn needs_issue(&self) -> bool {
        self.journal_id.is_some() && self.issue_id.is_none() && !self.is_aop
    }
}
