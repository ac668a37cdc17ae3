//! Create groups, content and content_relationships tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string_len(36).not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Groups::JoinCode).string_len(32).not_null().unique_key())
                    .col(ColumnDef::new(Groups::CreatedBy).string_len(36).not_null())
                    .col(
                        ColumnDef::new(Groups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Groups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Content::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Content::Id).string_len(36).not_null().primary_key())
                    .col(ColumnDef::new(Content::Type).string_len(64).not_null().default("text"))
                    .col(ColumnDef::new(Content::Data).text().not_null().default(""))
                    .col(ColumnDef::new(Content::GroupId).string_len(36).not_null())
                    .col(ColumnDef::new(Content::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(Content::ParentContentId).string_len(36))
                    .col(ColumnDef::new(Content::Metadata).json_binary())
                    .col(
                        ColumnDef::new(Content::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Content::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_group_id")
                            .from(Content::Table, Content::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_parent_content_id")
                            .from(Content::Table, Content::ParentContentId)
                            .to(Content::Table, Content::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Group listing, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_content_group_id_created_at")
                    .table(Content::Table)
                    .col(Content::GroupId)
                    .col(Content::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_parent_content_id")
                    .table(Content::Table)
                    .col(Content::ParentContentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContentRelationships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentRelationships::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentRelationships::FromContentId).string_len(36))
                    .col(
                        ColumnDef::new(ContentRelationships::ToContentId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentRelationships::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentRelationships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_relationships_from")
                            .from(ContentRelationships::Table, ContentRelationships::FromContentId)
                            .to(Content::Table, Content::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_relationships_to")
                            .from(ContentRelationships::Table, ContentRelationships::ToContentId)
                            .to(Content::Table, Content::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one inbound edge per item
        manager
            .create_index(
                Index::create()
                    .name("idx_content_relationships_to_unique")
                    .table(ContentRelationships::Table)
                    .col(ContentRelationships::ToContentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_relationships_from")
                    .table(ContentRelationships::Table)
                    .col(ContentRelationships::FromContentId)
                    .col(ContentRelationships::DisplayOrder)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentRelationships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Content::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Groups {
    Table,
    Id,
    Name,
    JoinCode,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Content {
    Table,
    Id,
    Type,
    Data,
    GroupId,
    UserId,
    ParentContentId,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ContentRelationships {
    Table,
    Id,
    FromContentId,
    ToContentId,
    DisplayOrder,
    CreatedAt,
}
