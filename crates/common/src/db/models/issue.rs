//! Issue entity (owned by the catalog CRUD application, read-only here)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Public issue identifier, also the parent id of article documents
    #[sea_orm(column_type = "Text", unique)]
    pub iid: String,

    pub journal_id: Uuid,

    /// Empty when the issue has no volume
    #[sea_orm(column_type = "Text")]
    pub volume: String,

    /// Empty when the issue has no number
    #[sea_orm(column_type = "Text")]
    pub number: String,

    pub publication_year: i32,

    #[sea_orm(column_type = "Text")]
    pub label: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id",
        on_delete = "Cascade"
    )]
    Journal,

    #[sea_orm(has_many = "super::article::Entity")]
    Articles,
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
