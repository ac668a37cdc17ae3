//! Content relationship entity (normalized parent/child edge).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inbound edge of a content item. `from_content_id = None` marks a root.
/// `to_content_id` is unique, so every item has at most one parent.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_relationships")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(nullable, indexed)]
    pub from_content_id: Option<String>,

    #[sea_orm(unique)]
    pub to_content_id: String,

    #[sea_orm(default_value = 0)]
    pub display_order: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::FromContentId",
        to = "super::content::Column::Id",
        on_delete = "Cascade"
    )]
    From,
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::ToContentId",
        to = "super::content::Column::Id",
        on_delete = "Cascade"
    )]
    To,
}

impl ActiveModelBehavior for ActiveModel {}
