//! Create tags and content_tags tables.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_content_tables::Content;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Id).string_len(36).not_null().primary_key())
                    .col(ColumnDef::new(Tags::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(Tags::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Tags::Color).string_len(32))
                    .col(
                        ColumnDef::new(Tags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tags_user_id_name")
                    .table(Tags::Table)
                    .col(Tags::UserId)
                    .col(Tags::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContentTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ContentTags::ContentId).string_len(36).not_null())
                    .col(ColumnDef::new(ContentTags::TagId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(ContentTags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ContentTags::ContentId)
                            .col(ContentTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_tags_content_id")
                            .from(ContentTags::Table, ContentTags::ContentId)
                            .to(Content::Table, Content::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_tags_tag_id")
                            .from(ContentTags::Table, ContentTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Reverse lookup for tag filtering
        manager
            .create_index(
                Index::create()
                    .name("idx_content_tags_tag_id")
                    .table(ContentTags::Table)
                    .col(ContentTags::TagId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
    UserId,
    Name,
    Color,
    CreatedAt,
}

#[derive(Iden)]
enum ContentTags {
    Table,
    ContentId,
    TagId,
    CreatedAt,
}
