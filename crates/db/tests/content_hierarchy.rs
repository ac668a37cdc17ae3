//! Hierarchy tests against a live `PostgreSQL`.
//!
//! Run with `--features integration` and the `TEST_DB_*` variables set.

#![cfg(feature = "integration")]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use list_db::listing::{TagFilter, ViewMode};
use list_db::repositories::{ContentRepository, GroupRepository, NewContent, TagRepository};
use list_db::test_utils::TestDatabase;
use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex, MutexGuard};

/// Tests share one database and truncate it, so they take turns.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn fresh_db() -> (MutexGuard<'static, ()>, Arc<DatabaseConnection>) {
    let guard = DB_LOCK.lock().await;
    let test_db = TestDatabase::new().await.unwrap();
    test_db.cleanup().await.unwrap();
    (guard, Arc::new(test_db.into_connection()))
}

fn new_content(group_id: &str, parent: Option<&str>, data: &str) -> NewContent {
    NewContent {
        content_type: "text".to_string(),
        data: data.to_string(),
        group_id: group_id.to_string(),
        user_id: "00000000-0000-0000-0000-000000000001".to_string(),
        parent_content_id: parent.map(str::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_root_then_child() {
    let (_guard, db) = fresh_db().await;

    let groups = GroupRepository::new(Arc::clone(&db));
    let content = ContentRepository::new(Arc::clone(&db));
    let group = groups
        .create("Hierarchy", "00000000-0000-0000-0000-000000000001")
        .await
        .unwrap();

    let root = content
        .create_content(new_content(&group.id, None, "root item"))
        .await
        .unwrap();
    let roots = content
        .get_content_by_parent(&group.id, None, 0, 20, ViewMode::Chronological)
        .await
        .unwrap();
    assert!(roots.iter().any(|c| c.content.id == root.id));

    let child = content
        .create_content(new_content(&group.id, Some(&root.id), "child item"))
        .await
        .unwrap();
    let children = content
        .get_content_by_parent(&group.id, Some(&root.id), 0, 20, ViewMode::Chronological)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].content.id, child.id);

    let counts = content.get_child_counts(&[root.id.clone()]).await.unwrap();
    assert_eq!(counts[&root.id], 1);

    let ancestors = content.get_ancestors(&child.id, 10).await.unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].id, root.id);

    content.delete_content(&root.id).await.unwrap();
    assert!(content.get_content_by_id(&child.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tag_filter_and_search() {
    let (_guard, db) = fresh_db().await;
    let user = "00000000-0000-0000-0000-000000000002";

    let groups = GroupRepository::new(Arc::clone(&db));
    let content = ContentRepository::new(Arc::clone(&db));
    let tags = TagRepository::new(Arc::clone(&db));
    let group = groups.create("Tags", user).await.unwrap();

    let a = content
        .create_content(new_content(&group.id, None, "buy groceries"))
        .await
        .unwrap();
    let b = content
        .create_content(new_content(&group.id, None, "buy gifts"))
        .await
        .unwrap();
    let work = tags.get_or_create(user, "work", None).await.unwrap();
    let done = tags.get_or_create(user, "done", None).await.unwrap();
    tags.add_tag_to_content(&a.id, &work.id).await.unwrap();
    tags.add_tag_to_content(&b.id, &work.id).await.unwrap();
    tags.add_tag_to_content(&b.id, &done.id).await.unwrap();
    tags.add_tag_to_content(&b.id, &done.id).await.unwrap();

    let filter = TagFilter::new(vec![work.id.clone()], vec![done.id.clone()]);
    let filtered = content
        .filter_content_by_tags(&group.id, None, &filter, 0, 20, ViewMode::Chronological)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].content.id, a.id);

    let hits = content
        .search_content(&group.id, "groceries", None, 0, 20, ViewMode::Chronological)
        .await
        .unwrap();
    assert_eq!(hits[0].content.id, a.id);
}

#[tokio::test]
async fn test_exact_search_treats_pattern_characters_literally() {
    let (_guard, db) = fresh_db().await;
    let user = "00000000-0000-0000-0000-000000000003";

    let groups = GroupRepository::new(Arc::clone(&db));
    let content = ContentRepository::new(Arc::clone(&db));
    let group = groups.create("Literal", user).await.unwrap();

    for data in ["50 apples", "5x0 file_name", "filexname"] {
        content
            .create_content(new_content(&group.id, None, data))
            .await
            .unwrap();
    }

    let underscore = content.search_exact(&group.id, "file_name").await.unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].data, "5x0 file_name");

    let percent = content.search_exact(&group.id, "%").await.unwrap();
    assert!(percent.is_empty());

    let backslash = content.search_exact(&group.id, "\\").await.unwrap();
    assert!(backslash.is_empty());

    let mixed_case = content.search_exact(&group.id, "FILE_NAME").await.unwrap();
    assert_eq!(mixed_case.len(), 1);
}
