//! Content entity.
//!
//! A single item in a nested list. The parent link is stored twice: the
//! legacy `parent_content_id` column and the normalized
//! `content_relationships` row kept in sync by a database trigger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Free-form kind, e.g. `text`, `folder`, `image`, `seo`.
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub content_type: String,

    /// Text body (or file name for folders).
    #[sea_orm(column_type = "Text")]
    pub data: String,

    #[sea_orm(indexed)]
    pub group_id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    /// Legacy parent pointer. Mirrored into `content_relationships`.
    #[sea_orm(nullable, indexed)]
    pub parent_content_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentContentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
    #[sea_orm(has_many = "super::content_tag::Entity")]
    ContentTags,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::content_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentTags.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::content_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::content_tag::Relation::Content.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
