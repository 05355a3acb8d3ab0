//! Journal entity (owned by the catalog CRUD application, read-only here)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "journals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Public journal identifier
    #[sea_orm(column_type = "Text", unique)]
    pub jid: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub abbrev_title: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub print_issn: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub electronic_issn: Option<String>,

    /// List of study area names
    #[sea_orm(column_type = "JsonBinary")]
    pub study_areas: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub pub_status: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,

    #[sea_orm(has_many = "super::article::Entity")]
    Articles,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Study area names, ignoring anything that is not a string
    pub fn study_area_names(&self) -> Vec<String> {
        self.study_areas
            .as_array()
            .map(|areas| {
                areas
                    .iter()
                    .filter_map(|area| area.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
