//! Group repository.

use std::sync::Arc;

use chrono::Utc;
use list_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::group_membership::MemberRole;
use crate::entities::{Group, GroupMembership, group, group_membership};

/// Repository for groups and their memberships.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl GroupRepository {
    /// Create a new group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Group Operations ====================

    /// Find group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group::Model>> {
        Group::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get group by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group not found: {id}")))
    }

    /// Find group by its join code.
    pub async fn find_by_join_code(&self, join_code: &str) -> AppResult<Option<group::Model>> {
        Group::find()
            .filter(group::Column::JoinCode.eq(join_code.to_uppercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Groups a user belongs to, most recently joined first.
    pub async fn find_for_user(&self, user_id: &str) -> AppResult<Vec<group::Model>> {
        let memberships = GroupMembership::find()
            .filter(group_membership::Column::UserId.eq(user_id))
            .order_by_desc(group_membership::Column::JoinedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if memberships.is_empty() {
            return Ok(vec![]);
        }

        let group_ids: Vec<String> = memberships.iter().map(|m| m.group_id.clone()).collect();
        let mut groups = Group::find()
            .filter(group::Column::Id.is_in(group_ids.clone()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        groups.sort_by_key(|g| group_ids.iter().position(|id| id == &g.id));
        Ok(groups)
    }

    /// Create a group and make `created_by` its owner, atomically.
    pub async fn create(&self, name: &str, created_by: &str) -> AppResult<group::Model> {
        let now = Utc::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let group = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name.to_string()),
            join_code: Set(self.id_gen.generate_join_code()),
            created_by: Set(created_by.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        group_membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group.id.clone()),
            user_id: Set(created_by.to_string()),
            role: Set(MemberRole::Owner),
            joined_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(group)
    }

    /// Rename a group.
    pub async fn rename(&self, id: &str, name: &str) -> AppResult<group::Model> {
        let existing = self.get_by_id(id).await?;
        let mut active: group::ActiveModel = existing.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now().into());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Member Operations ====================

    /// Members of a group, in join order.
    pub async fn list_members(&self, group_id: &str) -> AppResult<Vec<group_membership::Model>> {
        GroupMembership::find()
            .filter(group_membership::Column::GroupId.eq(group_id))
            .order_by_asc(group_membership::Column::JoinedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's membership in a group, if any.
    pub async fn find_membership(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_membership::Model>> {
        GroupMembership::find()
            .filter(group_membership::Column::GroupId.eq(group_id))
            .filter(group_membership::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is a member of a group.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find_membership(group_id, user_id).await?.is_some())
    }

    /// Add a member. An existing membership is returned unchanged.
    pub async fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> AppResult<group_membership::Model> {
        if let Some(existing) = self.find_membership(group_id, user_id).await? {
            return Ok(existing);
        }

        group_membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(role),
            joined_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Leave a group. The owner cannot leave.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> AppResult<()> {
        let membership = self
            .find_membership(group_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Not a member of this group".to_string()))?;

        if membership.role == MemberRole::Owner {
            return Err(AppError::BadRequest(
                "The group owner cannot leave the group".to_string(),
            ));
        }

        GroupMembership::delete_by_id(membership.id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    pub(crate) fn create_test_group(id: &str, created_by: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            name: "Family".to_string(),
            join_code: "ABCD2345".to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    pub(crate) fn create_test_member(
        group_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> group_membership::Model {
        group_membership::Model {
            id: format!("m-{group_id}-{user_id}"),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            role,
            joined_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_create_inserts_group_and_owner_in_one_transaction() {
        let group = create_test_group("g1", "u1");
        let owner = create_test_member("g1", "u1", MemberRole::Owner);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group.clone()]])
                .append_query_results([[owner]])
                .into_connection(),
        );

        let repo = GroupRepository::new(Arc::clone(&db));
        let result = repo.create("Family", "u1").await.unwrap();
        drop(repo);

        assert_eq!(result.id, "g1");

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let txn = format!("{log:?}");
        assert!(txn.contains("groups"));
        assert!(txn.contains("group_memberships"));
    }

    #[tokio::test]
    async fn test_find_for_user_without_memberships() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_membership::Model>::new()])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        assert!(repo.find_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_member_is_idempotent() {
        let existing = create_test_member("g1", "u2", MemberRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing.clone()]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo
            .add_member("g1", "u2", MemberRole::Member)
            .await
            .unwrap();

        assert_eq!(result, existing);
    }

    #[tokio::test]
    async fn test_owner_cannot_leave() {
        let owner = create_test_member("g1", "u1", MemberRole::Owner);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[owner]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let err = repo.leave_group("g1", "u1").await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_member_can_leave() {
        let member = create_test_member("g1", "u2", MemberRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[member]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        repo.leave_group("g1", "u2").await.unwrap();
    }
}
