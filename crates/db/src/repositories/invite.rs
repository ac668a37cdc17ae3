//! Invite repository: personal invite codes and the invite graph.

use std::sync::Arc;

use chrono::{Duration, Utc};
use list_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::entities::group_membership::MemberRole;
use crate::entities::{
    GroupInvitation, GroupMembership, UserInviteCode, group_invitation, group_membership,
    user_invite_code,
};

/// Outcome of redeeming an invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupResult {
    pub group_id: String,
    pub inviter_id: String,
    /// The user was already in the group; nothing was written.
    pub already_member: bool,
}

/// Aggregate numbers about a user's invite codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteStats {
    pub total_codes: u64,
    pub active_codes: u64,
    pub total_uses: i64,
    pub users_invited: u64,
}

/// A member node of the invite graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMember {
    pub user_id: String,
    pub joined_at: DateTimeWithTimeZone,
}

/// Directed "invited" edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteEdge {
    pub inviter_id: String,
    pub invitee_id: String,
    pub created_at: DateTimeWithTimeZone,
}

/// Raw invite graph of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteGraph {
    pub members: Vec<GraphMember>,
    pub edges: Vec<InviteEdge>,
}

/// Repository for invite codes and invitation edges.
#[derive(Clone)]
pub struct InviteRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl InviteRepository {
    /// Create a new invite repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Codes ====================

    /// Issue a new personal invite code.
    pub async fn create_user_invite_code(
        &self,
        user_id: &str,
        max_uses: Option<i32>,
        expires_in: Option<Duration>,
    ) -> AppResult<user_invite_code::Model> {
        if max_uses.is_some_and(|max| max < 1) {
            return Err(AppError::Validation(
                "max_uses must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let model = user_invite_code::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            invite_code: Set(self.id_gen.generate_invite_code()),
            max_uses: Set(max_uses),
            current_uses: Set(0),
            expires_at: Set(expires_in.map(|d| (now + d).into())),
            is_active: Set(true),
            created_at: Set(now.into()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a code by its text (case-insensitive).
    pub async fn find_code(&self, code: &str) -> AppResult<Option<user_invite_code::Model>> {
        UserInviteCode::find()
            .filter(user_invite_code::Column::InviteCode.eq(code.trim().to_uppercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's codes, newest first.
    pub async fn list_codes_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<user_invite_code::Model>> {
        UserInviteCode::find()
            .filter(user_invite_code::Column::UserId.eq(user_id))
            .order_by_desc(user_invite_code::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deactivate one of the user's codes.
    pub async fn deactivate_code(&self, id: &str, user_id: &str) -> AppResult<()> {
        let result = UserInviteCode::update_many()
            .col_expr(user_invite_code::Column::IsActive, Expr::value(false))
            .filter(user_invite_code::Column::Id.eq(id))
            .filter(user_invite_code::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Invite code not found: {id}")));
        }
        Ok(())
    }

    // ==================== Redemption ====================

    /// Redeem `code` to join `group_id` as `user_id`.
    ///
    /// Runs in one transaction: lock and validate the code, check the
    /// inviter is in the group, insert the membership, record the invitation
    /// edge and count the use. The use is only counted while below
    /// `max_uses`. Joining a group the user already belongs to writes
    /// nothing and reports `already_member`.
    pub async fn join_group_with_user_code(
        &self,
        code: &str,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<JoinGroupResult> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let invite = UserInviteCode::find()
            .filter(user_invite_code::Column::InviteCode.eq(code.trim().to_uppercase()))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Invite code not found".to_string()))?;

        validate_code(&invite, user_id)?;

        let inviter_membership = GroupMembership::find()
            .filter(group_membership::Column::GroupId.eq(group_id))
            .filter(group_membership::Column::UserId.eq(&invite.user_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if inviter_membership.is_none() {
            return Err(AppError::Forbidden(
                "Inviter is not a member of this group".to_string(),
            ));
        }

        let existing = GroupMembership::find()
            .filter(group_membership::Column::GroupId.eq(group_id))
            .filter(group_membership::Column::UserId.eq(user_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if existing.is_some() {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(JoinGroupResult {
                group_id: group_id.to_string(),
                inviter_id: invite.user_id,
                already_member: true,
            });
        }

        let now = Utc::now();

        group_membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(MemberRole::Member),
            joined_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        group_invitation::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            inviter_id: Set(invite.user_id.clone()),
            invitee_id: Set(user_id.to_string()),
            invite_code: Set(Some(invite.invite_code.clone())),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let counted = UserInviteCode::update_many()
            .col_expr(
                user_invite_code::Column::CurrentUses,
                Expr::col(user_invite_code::Column::CurrentUses).add(1),
            )
            .filter(user_invite_code::Column::Id.eq(&invite.id))
            .filter(
                Condition::any()
                    .add(user_invite_code::Column::MaxUses.is_null())
                    .add(
                        Expr::col(user_invite_code::Column::CurrentUses)
                            .lt(Expr::col(user_invite_code::Column::MaxUses)),
                    ),
            )
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if counted.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Err(AppError::BadRequest(
                "Invite code has reached its usage limit".to_string(),
            ));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(JoinGroupResult {
            group_id: group_id.to_string(),
            inviter_id: invite.user_id,
            already_member: false,
        })
    }

    // ==================== Reporting ====================

    /// Totals across a user's invite codes.
    pub async fn get_user_invite_stats(&self, user_id: &str) -> AppResult<InviteStats> {
        let codes = self.list_codes_for_user(user_id).await?;

        let invitees = GroupInvitation::find()
            .select_only()
            .column(group_invitation::Column::InviteeId)
            .filter(group_invitation::Column::InviterId.eq(user_id))
            .distinct()
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(InviteStats {
            total_codes: codes.len() as u64,
            active_codes: codes.iter().filter(|c| c.is_redeemable()).count() as u64,
            total_uses: codes.iter().map(|c| i64::from(c.current_uses)).sum(),
            users_invited: invitees.len() as u64,
        })
    }

    /// Members and invitation edges of a group, edges oldest first.
    pub async fn get_invite_graph(&self, group_id: &str) -> AppResult<InviteGraph> {
        let members = GroupMembership::find()
            .filter(group_membership::Column::GroupId.eq(group_id))
            .order_by_asc(group_membership::Column::JoinedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let edges = GroupInvitation::find()
            .filter(group_invitation::Column::GroupId.eq(group_id))
            .order_by_asc(group_invitation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(InviteGraph {
            members: members
                .into_iter()
                .map(|m| GraphMember {
                    user_id: m.user_id,
                    joined_at: m.joined_at,
                })
                .collect(),
            edges: edges
                .into_iter()
                .map(|e| InviteEdge {
                    inviter_id: e.inviter_id,
                    invitee_id: e.invitee_id,
                    created_at: e.created_at,
                })
                .collect(),
        })
    }
}

fn validate_code(invite: &user_invite_code::Model, redeemer_id: &str) -> AppResult<()> {
    if !invite.is_active {
        return Err(AppError::BadRequest("Invite code is no longer active".to_string()));
    }
    if invite.is_expired() {
        return Err(AppError::BadRequest("Invite code has expired".to_string()));
    }
    if invite.is_exhausted() {
        return Err(AppError::BadRequest(
            "Invite code has reached its usage limit".to_string(),
        ));
    }
    if invite.user_id == redeemer_id {
        return Err(AppError::BadRequest(
            "You cannot redeem your own invite code".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::repositories::group::tests::create_test_member;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_code(user_id: &str) -> user_invite_code::Model {
        user_invite_code::Model {
            id: "code-1".to_string(),
            user_id: user_id.to_string(),
            invite_code: "XYZW2345".to_string(),
            max_uses: Some(5),
            current_uses: 1,
            expires_at: None,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_invitation(inviter: &str, invitee: &str) -> group_invitation::Model {
        group_invitation::Model {
            id: format!("inv-{inviter}-{invitee}"),
            group_id: "g1".to_string(),
            inviter_id: inviter.to_string(),
            invitee_id: invitee.to_string(),
            invite_code: Some("XYZW2345".to_string()),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_join_group_with_user_code() {
        let code = create_test_code("alice");
        let inviter = create_test_member("g1", "alice", MemberRole::Owner);
        let joined = create_test_member("g1", "bob", MemberRole::Member);
        let edge = create_test_invitation("alice", "bob");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[code]])
                .append_query_results([[inviter]])
                .append_query_results([Vec::<group_membership::Model>::new()])
                .append_query_results([[joined]])
                .append_query_results([[edge]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = InviteRepository::new(Arc::clone(&db));
        let result = repo
            .join_group_with_user_code("xyzw2345", "g1", "bob")
            .await
            .unwrap();
        drop(repo);

        assert_eq!(
            result,
            JoinGroupResult {
                group_id: "g1".to_string(),
                inviter_id: "alice".to_string(),
                already_member: false,
            }
        );

        let log = format!(
            "{:?}",
            Arc::try_unwrap(db).ok().unwrap().into_transaction_log()
        );
        assert!(log.contains("FOR UPDATE"));
        assert!(log.contains("group_invitations"));
        assert!(log.contains("current_uses"));
        assert!(log.contains("max_uses"));
    }

    #[tokio::test]
    async fn test_join_fails_when_last_use_was_taken() {
        let code = create_test_code("alice");
        let inviter = create_test_member("g1", "alice", MemberRole::Owner);
        let joined = create_test_member("g1", "bob", MemberRole::Member);
        let edge = create_test_invitation("alice", "bob");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[code]])
                .append_query_results([[inviter]])
                .append_query_results([Vec::<group_membership::Model>::new()])
                .append_query_results([[joined]])
                .append_query_results([[edge]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = InviteRepository::new(db);
        let err = repo
            .join_group_with_user_code("XYZW2345", "g1", "bob")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_join_when_already_member() {
        let code = create_test_code("alice");
        let inviter = create_test_member("g1", "alice", MemberRole::Owner);
        let existing = create_test_member("g1", "bob", MemberRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[code]])
                .append_query_results([[inviter]])
                .append_query_results([[existing]])
                .into_connection(),
        );

        let repo = InviteRepository::new(db);
        let result = repo
            .join_group_with_user_code("XYZW2345", "g1", "bob")
            .await
            .unwrap();

        assert!(result.already_member);
    }

    #[tokio::test]
    async fn test_join_with_unknown_code() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_invite_code::Model>::new()])
                .into_connection(),
        );

        let repo = InviteRepository::new(db);
        let err = repo
            .join_group_with_user_code("NOPE", "g1", "bob")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_join_requires_inviter_membership() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_code("alice")]])
                .append_query_results([Vec::<group_membership::Model>::new()])
                .into_connection(),
        );

        let repo = InviteRepository::new(db);
        let err = repo
            .join_group_with_user_code("XYZW2345", "g1", "bob")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_validate_code() {
        let mut code = create_test_code("alice");
        assert!(validate_code(&code, "bob").is_ok());
        assert!(validate_code(&code, "alice").is_err());

        code.current_uses = 5;
        assert!(validate_code(&code, "bob").is_err());

        code.current_uses = 0;
        code.expires_at = Some((Utc::now() - Duration::hours(1)).into());
        assert!(validate_code(&code, "bob").is_err());

        code.expires_at = None;
        code.is_active = false;
        assert!(validate_code(&code, "bob").is_err());
    }

    #[tokio::test]
    async fn test_get_user_invite_stats() {
        let mut used_up = create_test_code("alice");
        used_up.id = "code-2".to_string();
        used_up.current_uses = 5;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_code("alice"), used_up]])
                .append_query_results([[
                    maplit::btreemap! { "invitee_id" => sea_orm::Value::from("bob") },
                    maplit::btreemap! { "invitee_id" => sea_orm::Value::from("carol") },
                ]])
                .into_connection(),
        );

        let repo = InviteRepository::new(db);
        let stats = repo.get_user_invite_stats("alice").await.unwrap();

        assert_eq!(
            stats,
            InviteStats {
                total_codes: 2,
                active_codes: 1,
                total_uses: 6,
                users_invited: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_create_code_rejects_zero_uses() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = InviteRepository::new(db);
        let err = repo
            .create_user_invite_code("alice", Some(0), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }
}
