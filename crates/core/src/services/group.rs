//! Group service.
//!
//! Groups, memberships and personal invite codes. Every backend call goes
//! through [`with_retry`], so a transient database error is retried with
//! backoff while client errors surface immediately.

use chrono::Duration;
use list_common::{AppError, AppResult, RetryConfig, with_retry};
use list_db::entities::group_membership::MemberRole;
use list_db::entities::{group, group_membership, user_invite_code};
use list_db::repositories::{GroupRepository, InviteRepository, InviteStats, JoinGroupResult};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::invite_graph::{InviteTree, build_invite_tree};

/// Longest accepted invite code lifetime.
const MAX_INVITE_DAYS: i64 = 365;

/// Input for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Input for joining a group.
///
/// With `group_id` the code is a personal invite code; without it the code
/// is the group's own join code.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupInput {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub group_id: Option<String>,
}

/// Input for issuing an invite code.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteCodeInput {
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    #[validate(range(min = 1, max = 365))]
    pub expires_in_days: Option<i64>,
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    invite_repo: InviteRepository,
    retry: RetryConfig,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub fn new(group_repo: GroupRepository, invite_repo: InviteRepository) -> Self {
        Self {
            group_repo,
            invite_repo,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    // ==================== Groups ====================

    /// Create a group owned by `user_id`.
    pub async fn create(&self, user_id: &str, input: CreateGroupInput) -> AppResult<group::Model> {
        input.validate()?;
        let name = input.name.trim();

        let group = with_retry(&self.retry, "create_group", || {
            self.group_repo.create(name, user_id)
        })
        .await?;

        info!(group_id = %group.id, user_id, "Group created");
        Ok(group)
    }

    /// A group, visible to members only.
    pub async fn get(&self, user_id: &str, group_id: &str) -> AppResult<group::Model> {
        self.ensure_member(group_id, user_id).await?;
        with_retry(&self.retry, "get_group", || self.group_repo.get_by_id(group_id)).await
    }

    /// Groups the user belongs to.
    pub async fn my_groups(&self, user_id: &str) -> AppResult<Vec<group::Model>> {
        with_retry(&self.retry, "find_groups_for_user", || {
            self.group_repo.find_for_user(user_id)
        })
        .await
    }

    /// Rename a group. Owners and admins only.
    pub async fn rename(
        &self,
        user_id: &str,
        group_id: &str,
        input: CreateGroupInput,
    ) -> AppResult<group::Model> {
        input.validate()?;
        let membership = self.ensure_member(group_id, user_id).await?;
        if !membership.role.can_manage() {
            return Err(AppError::Forbidden(
                "Only owners and admins can rename a group".to_string(),
            ));
        }

        let name = input.name.trim();
        with_retry(&self.retry, "rename_group", || {
            self.group_repo.rename(group_id, name)
        })
        .await
    }

    /// Members of a group, visible to members only.
    pub async fn members(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> AppResult<Vec<group_membership::Model>> {
        self.ensure_member(group_id, user_id).await?;
        with_retry(&self.retry, "list_members", || {
            self.group_repo.list_members(group_id)
        })
        .await
    }

    /// Fail with `Forbidden` unless `user_id` belongs to the group.
    pub async fn ensure_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<group_membership::Model> {
        with_retry(&self.retry, "find_membership", || {
            self.group_repo.find_membership(group_id, user_id)
        })
        .await?
        .ok_or_else(|| AppError::Forbidden("Not a member of this group".to_string()))
    }

    /// Join a group by personal invite code or by the group's join code.
    pub async fn join(&self, user_id: &str, input: JoinGroupInput) -> AppResult<JoinGroupResult> {
        input.validate()?;

        let result = match &input.group_id {
            Some(group_id) => {
                with_retry(&self.retry, "join_group_with_user_code", || {
                    self.invite_repo
                        .join_group_with_user_code(&input.code, group_id, user_id)
                })
                .await?
            }
            None => self.join_with_group_code(user_id, &input.code).await?,
        };

        info!(
            group_id = %result.group_id,
            user_id,
            inviter_id = %result.inviter_id,
            already_member = result.already_member,
            "Joined group"
        );
        Ok(result)
    }

    async fn join_with_group_code(&self, user_id: &str, code: &str) -> AppResult<JoinGroupResult> {
        let group = with_retry(&self.retry, "find_group_by_join_code", || {
            self.group_repo.find_by_join_code(code.trim())
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Join code not found".to_string()))?;

        let already_member = with_retry(&self.retry, "is_member", || {
            self.group_repo.is_member(&group.id, user_id)
        })
        .await?;

        if !already_member {
            with_retry(&self.retry, "add_member", || {
                self.group_repo.add_member(&group.id, user_id, MemberRole::Member)
            })
            .await?;
        }

        Ok(JoinGroupResult {
            group_id: group.id,
            inviter_id: group.created_by,
            already_member,
        })
    }

    /// Leave a group.
    pub async fn leave(&self, user_id: &str, group_id: &str) -> AppResult<()> {
        with_retry(&self.retry, "leave_group", || {
            self.group_repo.leave_group(group_id, user_id)
        })
        .await
    }

    // ==================== Invites ====================

    /// Issue a personal invite code.
    pub async fn create_invite_code(
        &self,
        user_id: &str,
        input: CreateInviteCodeInput,
    ) -> AppResult<user_invite_code::Model> {
        input.validate()?;
        let expires_in = input
            .expires_in_days
            .map(|days| Duration::days(days.min(MAX_INVITE_DAYS)));

        with_retry(&self.retry, "create_user_invite_code", || {
            self.invite_repo
                .create_user_invite_code(user_id, input.max_uses, expires_in)
        })
        .await
    }

    /// The user's invite codes.
    pub async fn invite_codes(&self, user_id: &str) -> AppResult<Vec<user_invite_code::Model>> {
        with_retry(&self.retry, "list_invite_codes", || {
            self.invite_repo.list_codes_for_user(user_id)
        })
        .await
    }

    /// Deactivate one of the user's codes.
    pub async fn deactivate_invite_code(&self, user_id: &str, code_id: &str) -> AppResult<()> {
        with_retry(&self.retry, "deactivate_invite_code", || {
            self.invite_repo.deactivate_code(code_id, user_id)
        })
        .await
    }

    /// Totals across the user's invite codes.
    pub async fn invite_stats(&self, user_id: &str) -> AppResult<InviteStats> {
        with_retry(&self.retry, "get_user_invite_stats", || {
            self.invite_repo.get_user_invite_stats(user_id)
        })
        .await
    }

    /// Who invited whom in a group, as a tree.
    pub async fn invite_tree(&self, user_id: &str, group_id: &str) -> AppResult<InviteTree> {
        self.ensure_member(group_id, user_id).await?;
        let graph = with_retry(&self.retry, "get_invite_graph", || {
            self.invite_repo.get_invite_graph(group_id)
        })
        .await?;

        Ok(build_invite_tree(&graph))
    }
}
