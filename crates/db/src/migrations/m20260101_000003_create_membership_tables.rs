//! Create group_memberships, user_invite_codes and group_invitations tables.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_content_tables::Groups;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMemberships::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupMemberships::GroupId).string_len(36).not_null())
                    .col(ColumnDef::new(GroupMemberships::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(GroupMemberships::Role)
                            .string_len(16)
                            .not_null()
                            .default("member"),
                    )
                    .col(
                        ColumnDef::new(GroupMemberships::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_memberships_group_id")
                            .from(GroupMemberships::Table, GroupMemberships::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_memberships_group_user")
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::GroupId)
                    .col(GroupMemberships::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_memberships_user_id")
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserInviteCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserInviteCodes::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserInviteCodes::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(UserInviteCodes::InviteCode)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UserInviteCodes::MaxUses).integer())
                    .col(
                        ColumnDef::new(UserInviteCodes::CurrentUses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UserInviteCodes::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(UserInviteCodes::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UserInviteCodes::CreatedAt)
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
                    .name("idx_user_invite_codes_user_id")
                    .table(UserInviteCodes::Table)
                    .col(UserInviteCodes::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupInvitations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupInvitations::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupInvitations::GroupId).string_len(36).not_null())
                    .col(ColumnDef::new(GroupInvitations::InviterId).string_len(36).not_null())
                    .col(ColumnDef::new(GroupInvitations::InviteeId).string_len(36).not_null())
                    .col(ColumnDef::new(GroupInvitations::InviteCode).string_len(32))
                    .col(
                        ColumnDef::new(GroupInvitations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_invitations_group_id")
                            .from(GroupInvitations::Table, GroupInvitations::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_invitations_group_created")
                    .table(GroupInvitations::Table)
                    .col(GroupInvitations::GroupId)
                    .col(GroupInvitations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_invitations_inviter_id")
                    .table(GroupInvitations::Table)
                    .col(GroupInvitations::InviterId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupInvitations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserInviteCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMemberships::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GroupMemberships {
    Table,
    Id,
    GroupId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
enum UserInviteCodes {
    Table,
    Id,
    UserId,
    InviteCode,
    MaxUses,
    CurrentUses,
    ExpiresAt,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum GroupInvitations {
    Table,
    Id,
    GroupId,
    InviterId,
    InviteeId,
    InviteCode,
    CreatedAt,
}
