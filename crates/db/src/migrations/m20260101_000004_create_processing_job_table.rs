//! Create content_processing_jobs table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentProcessingJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentProcessingJobs::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::UserId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContentProcessingJobs::GroupId).string_len(36))
                    .col(ColumnDef::new(ContentProcessingJobs::ContentId).string_len(36))
                    .col(
                        ColumnDef::new(ContentProcessingJobs::JobType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::Payload)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(ContentProcessingJobs::Result).json_binary())
                    .col(ColumnDef::new(ContentProcessingJobs::Error).text())
                    .col(
                        ColumnDef::new(ContentProcessingJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ContentProcessingJobs::CompletedAt)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-user job list, optionally filtered by status
        manager
            .create_index(
                Index::create()
                    .name("idx_content_processing_jobs_user_status")
                    .table(ContentProcessingJobs::Table)
                    .col(ContentProcessingJobs::UserId)
                    .col(ContentProcessingJobs::Status)
                    .col(ContentProcessingJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentProcessingJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ContentProcessingJobs {
    Table,
    Id,
    UserId,
    GroupId,
    ContentId,
    JobType,
    Status,
    Progress,
    Payload,
    Result,
    Error,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
