//! Invite code redemption against a live `PostgreSQL`.
//!
//! Run with `--features integration` and the `TEST_DB_*` variables set.

#![cfg(feature = "integration")]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use list_common::AppError;
use list_db::repositories::{GroupRepository, InviteRepository};
use list_db::test_utils::TestDatabase;

const OWNER: &str = "00000000-0000-0000-0000-000000000010";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_use_code_admits_one_of_many_concurrent_joins() {
    let test_db = TestDatabase::new().await.unwrap();
    test_db.cleanup().await.unwrap();
    let db = Arc::new(test_db.into_connection());

    let group = GroupRepository::new(Arc::clone(&db))
        .create("Redemption", OWNER)
        .await
        .unwrap();
    let invites = InviteRepository::new(Arc::clone(&db));
    let code = invites
        .create_user_invite_code(OWNER, Some(1), None)
        .await
        .unwrap();

    let joins: Vec<_> = (0..8)
        .map(|i| {
            let invites = invites.clone();
            let code = code.invite_code.clone();
            let group_id = group.id.clone();
            tokio::spawn(async move {
                let user = format!("00000000-0000-0000-0000-0000000001{i:02}");
                invites.join_group_with_user_code(&code, &group_id, &user).await
            })
        })
        .collect();

    let mut admitted = 0;
    for join in joins {
        match join.await.unwrap() {
            Ok(result) => {
                assert!(!result.already_member);
                admitted += 1;
            }
            Err(e) => assert!(matches!(e, AppError::BadRequest(_)), "unexpected error: {e}"),
        }
    }

    assert_eq!(admitted, 1);
    let code = invites.find_code(&code.invite_code).await.unwrap().unwrap();
    assert_eq!(code.current_uses, 1);
}
