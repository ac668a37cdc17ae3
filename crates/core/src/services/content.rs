//! Content service.

use list_common::{AppError, AppResult};
use list_db::entities::content;
use list_db::listing::{TagFilter, ViewMode};
use list_db::repositories::{
    ContentPatch, ContentRepository, ContentWithMeta, NewContent, TagRepository,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};
use validator::Validate;

use crate::events::EventPublisherService;
use crate::lambda::LambdaService;

/// Largest accepted `data` body, in bytes.
pub const MAX_DATA_BYTES: usize = 1024 * 1024;

/// Default breadcrumb depth.
pub const DEFAULT_ANCESTOR_LIMIT: u64 = 50;

/// Input for creating content.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentInput {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64))]
    pub content_type: String,
    pub data: String,
    #[validate(length(min = 1))]
    pub group_id: String,
    pub parent_content_id: Option<String>,
    pub metadata: Option<Value>,
    /// Tag names, created for the user when missing.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Listing parameters shared by list, filter and search.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub offset: u64,
    pub limit: u64,
    pub view_mode: ViewMode,
}

/// Content service for business logic.
#[derive(Clone)]
pub struct ContentService {
    content_repo: ContentRepository,
    tag_repo: TagRepository,
    lambda: LambdaService,
    events: EventPublisherService,
}

impl ContentService {
    /// Create a new content service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        tag_repo: TagRepository,
        lambda: LambdaService,
        events: EventPublisherService,
    ) -> Self {
        Self {
            content_repo,
            tag_repo,
            lambda,
            events,
        }
    }

    // ==================== Reads ====================

    /// Children of `parent_id` (roots when `None`), narrowed by a tag filter.
    pub async fn list(
        &self,
        group_id: &str,
        parent_id: Option<&str>,
        filter: &TagFilter,
        query: &ListQuery,
    ) -> AppResult<Vec<ContentWithMeta>> {
        self.content_repo
            .filter_content_by_tags(
                group_id,
                parent_id,
                filter,
                query.offset,
                query.limit,
                query.view_mode,
            )
            .await
    }

    /// Search a group's content.
    pub async fn search(
        &self,
        group_id: &str,
        text: &str,
        parent_id: Option<&str>,
        query: &ListQuery,
    ) -> AppResult<Vec<ContentWithMeta>> {
        self.content_repo
            .search_content(
                group_id,
                text,
                parent_id,
                query.offset,
                query.limit,
                query.view_mode,
            )
            .await
    }

    /// Get an item with its tags and child count.
    pub async fn get(&self, id: &str) -> AppResult<Option<ContentWithMeta>> {
        self.content_repo.get_content_by_id(id).await
    }

    /// Get an item, failing when it does not exist.
    pub async fn get_required(&self, id: &str) -> AppResult<ContentWithMeta> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound(id.to_string()))
    }

    /// Breadcrumb chain of an item, root first.
    pub async fn ancestors(&self, id: &str) -> AppResult<Vec<content::Model>> {
        self.content_repo
            .get_ancestors(id, DEFAULT_ANCESTOR_LIMIT)
            .await
    }

    /// Number of direct children per ID.
    pub async fn child_counts(&self, ids: &[String]) -> AppResult<HashMap<String, i64>> {
        self.content_repo.get_child_counts(ids).await
    }

    // ==================== Writes ====================

    /// Create an item.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateContentInput,
    ) -> AppResult<ContentWithMeta> {
        self.create_with_tags(user_id, input).await
    }

    /// Create an item, then attach its tags by name.
    pub async fn create_with_tags(
        &self,
        user_id: &str,
        input: CreateContentInput,
    ) -> AppResult<ContentWithMeta> {
        input.validate()?;
        validate_data(&input.data)?;

        if let Some(parent_id) = &input.parent_content_id {
            let parent = self
                .content_repo
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::ContentNotFound(parent_id.clone()))?;
            if parent.group_id != input.group_id {
                return Err(AppError::BadRequest(
                    "Parent belongs to another group".to_string(),
                ));
            }
        }

        let created = self
            .content_repo
            .create_content(NewContent {
                id: None,
                content_type: input.content_type,
                data: input.data,
                group_id: input.group_id,
                user_id: user_id.to_string(),
                parent_content_id: input.parent_content_id,
                metadata: input.metadata,
            })
            .await?;

        let mut tags = Vec::new();
        for name in normalize_tag_names(&input.tags) {
            let tag = self.tag_repo.get_or_create(user_id, &name, None).await?;
            self.tag_repo
                .add_tag_to_content(&created.id, &tag.id)
                .await?;
            tags.push(tag);
        }

        info!(content_id = %created.id, group_id = %created.group_id, tags = tags.len(), "Content created");
        self.notify_inserted(&created).await;

        Ok(ContentWithMeta {
            content: created,
            tags,
            child_count: 0,
        })
    }

    /// Update data, type and/or metadata.
    pub async fn update(&self, id: &str, patch: ContentPatch) -> AppResult<content::Model> {
        if let Some(content_type) = &patch.content_type {
            if content_type.trim().is_empty() {
                return Err(AppError::Validation("type must not be empty".to_string()));
            }
        }
        if let Some(data) = &patch.data {
            validate_data(data)?;
        }

        let updated = self.content_repo.update_content(id, patch).await?;
        self.notify_updated(&updated).await;
        Ok(updated)
    }

    /// Merge keys into an item's metadata.
    pub async fn update_metadata(&self, id: &str, metadata: Value) -> AppResult<content::Model> {
        let updated = self
            .content_repo
            .update_content_metadata(id, metadata)
            .await?;
        self.notify_updated(&updated).await;
        Ok(updated)
    }

    /// Make an item public or private.
    pub async fn toggle_sharing(&self, id: &str, is_public: bool) -> AppResult<content::Model> {
        let updated = self
            .content_repo
            .toggle_content_sharing(id, is_public)
            .await?;
        self.notify_updated(&updated).await;
        Ok(updated)
    }

    /// Delete an item and its subtree.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let existing = self
            .content_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound(id.to_string()))?;

        self.content_repo.delete_content(id).await?;
        info!(content_id = %id, group_id = %existing.group_id, "Content deleted");
        self.notify_deleted(&existing).await;
        Ok(())
    }

    /// Delete several items of one group, returning how many were removed.
    ///
    /// IDs that are missing or belong to another group are skipped.
    pub async fn delete_many(&self, group_id: &str, ids: &[String]) -> AppResult<u64> {
        let existing: Vec<_> = self
            .content_repo
            .find_by_ids(ids)
            .await?
            .into_iter()
            .filter(|c| c.group_id == group_id)
            .collect();
        if existing.is_empty() {
            return Ok(0);
        }

        let found: Vec<String> = existing.iter().map(|c| c.id.clone()).collect();
        let deleted = self.content_repo.delete_contents(&found).await?;
        info!(group_id, requested = ids.len(), deleted, "Bulk content delete");

        for row in &existing {
            self.notify_deleted(row).await;
        }
        Ok(deleted)
    }

    /// Queue SEO extraction for a URL, returning the job ID.
    pub async fn extract_seo(
        &self,
        url: &str,
        group_id: &str,
        parent_id: Option<&str>,
        user_id: &str,
    ) -> AppResult<String> {
        let response = self
            .lambda
            .seo_extract(url, group_id, parent_id, user_id)
            .await?;

        response.job_id.ok_or_else(|| {
            AppError::ExternalService("SEO extraction was not queued".to_string())
        })
    }

    // ==================== Events ====================

    async fn notify_inserted(&self, row: &content::Model) {
        if let Err(e) = self.events.publish_content_inserted(row).await {
            warn!(error = %e, content_id = %row.id, "Failed to publish content inserted event");
        }
    }

    async fn notify_updated(&self, row: &content::Model) {
        if let Err(e) = self.events.publish_content_updated(row).await {
            warn!(error = %e, content_id = %row.id, "Failed to publish content updated event");
        }
    }

    async fn notify_deleted(&self, row: &content::Model) {
        if let Err(e) = self
            .events
            .publish_content_deleted(&row.id, &row.group_id)
            .await
        {
            warn!(error = %e, content_id = %row.id, "Failed to publish content deleted event");
        }
    }
}

fn validate_data(data: &str) -> AppResult<()> {
    if data.len() > MAX_DATA_BYTES {
        return Err(AppError::Validation(format!(
            "data exceeds {MAX_DATA_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Trimmed, non-empty, first occurrence wins.
fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::events::{EventPublisher, RealtimeEvent, Topic};
    use crate::lambda::tests::StubInvoker;
    use crate::lambda::InvokeResponse;
    use async_trait::async_trait;
    use chrono::Utc;
    use list_db::entities::tag;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast;

    /// Publisher that remembers what it was asked to send.
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub(crate) events: Mutex<Vec<(String, RealtimeEvent)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &Topic, event: RealtimeEvent) -> AppResult<()> {
            self.events.lock().unwrap().push((topic.to_string(), event));
            Ok(())
        }

        fn subscribe(&self, _topic: &Topic) -> broadcast::Receiver<RealtimeEvent> {
            broadcast::channel(1).1
        }
    }

    pub(crate) fn create_test_content(id: &str, group_id: &str) -> content::Model {
        content::Model {
            id: id.to_string(),
            content_type: "text".to_string(),
            data: "hello".to_string(),
            group_id: group_id.to_string(),
            user_id: "u1".to_string(),
            parent_content_id: None,
            metadata: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn create_test_tag(id: &str, name: &str) -> tag::Model {
        tag::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            color: None,
            created_at: Utc::now().into(),
        }
    }

    fn empty_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn service(
        content_db: Arc<DatabaseConnection>,
        tag_db: Arc<DatabaseConnection>,
        lambda: Arc<StubInvoker>,
        events: Arc<RecordingPublisher>,
    ) -> ContentService {
        ContentService::new(
            ContentRepository::new(content_db),
            TagRepository::new(tag_db),
            LambdaService::new(lambda),
            events,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_empty_type() {
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(empty_db(), empty_db(), StubInvoker::ok(json!({})), events);

        let err = svc
            .create(
                "u1",
                CreateContentInput {
                    content_type: String::new(),
                    data: "x".to_string(),
                    group_id: "g1".to_string(),
                    ..CreateContentInput::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_data() {
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(empty_db(), empty_db(), StubInvoker::ok(json!({})), events);

        let err = svc
            .create(
                "u1",
                CreateContentInput {
                    content_type: "text".to_string(),
                    data: "a".repeat(MAX_DATA_BYTES + 1),
                    group_id: "g1".to_string(),
                    ..CreateContentInput::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_with_tags_attaches_and_publishes() {
        let created = create_test_content("c1", "g1");
        let content_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[created.clone()]])
                .into_connection(),
        );
        // "work" exists, "home" is created.
        let tag_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_tag("t1", "work")]])
                .append_query_results([Vec::<tag::Model>::new()])
                .append_query_results([[create_test_tag("t2", "home")]])
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(content_db, tag_db, StubInvoker::ok(json!({})), events.clone());

        let result = svc
            .create_with_tags(
                "u1",
                CreateContentInput {
                    content_type: "text".to_string(),
                    data: "hello".to_string(),
                    group_id: "g1".to_string(),
                    tags: vec!["work".to_string(), " home ".to_string(), "work".to_string()],
                    ..CreateContentInput::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.content.id, "c1");
        assert_eq!(result.child_count, 0);
        let names: Vec<&str> = result.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["work", "home"]);

        let published = events.events.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "content:g1");
        assert!(matches!(published[0].1, RealtimeEvent::ContentInserted { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_parent_from_other_group() {
        let parent = create_test_content("p1", "g2");
        let content_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[parent]])
                .into_connection(),
        );
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(content_db, empty_db(), StubInvoker::ok(json!({})), events);

        let err = svc
            .create(
                "u1",
                CreateContentInput {
                    content_type: "text".to_string(),
                    data: "child".to_string(),
                    group_id: "g1".to_string(),
                    parent_content_id: Some("p1".to_string()),
                    ..CreateContentInput::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_content() {
        let content_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<content::Model>::new()])
                .into_connection(),
        );
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(content_db, empty_db(), StubInvoker::ok(json!({})), events.clone());

        let err = svc.delete("nope").await.unwrap_err();
        assert!(matches!(err, AppError::ContentNotFound(_)));
        assert!(events.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_publishes_to_group() {
        let existing = create_test_content("c1", "g1");
        let content_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(content_db, empty_db(), StubInvoker::ok(json!({})), events.clone());

        svc.delete("c1").await.unwrap();

        let published = events.events.lock().unwrap();
        assert_eq!(
            published[0].1,
            RealtimeEvent::ContentDeleted {
                id: "c1".to_string(),
                group_id: "g1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_delete_many_skips_missing_and_foreign_ids() {
        let content_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_content("c1", "g1"),
                    create_test_content("c2", "g2"),
                ]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(content_db, empty_db(), StubInvoker::ok(json!({})), events.clone());

        let deleted = svc
            .delete_many("g1", &["c1".to_string(), "c2".to_string(), "gone".to_string()])
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(events.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_extract_seo_returns_job_id() {
        let stub = StubInvoker::respond(InvokeResponse {
            success: true,
            queued: Some(true),
            job_id: Some("job-9".to_string()),
            ..InvokeResponse::default()
        });
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(empty_db(), empty_db(), stub, events);

        let job_id = svc
            .extract_seo("https://example.com", "g1", Some("p1"), "u1")
            .await
            .unwrap();

        assert_eq!(job_id, "job-9");
    }

    #[tokio::test]
    async fn test_extract_seo_without_job_id() {
        let events = Arc::new(RecordingPublisher::default());
        let svc = service(empty_db(), empty_db(), StubInvoker::ok(json!({})), events);

        let err = svc
            .extract_seo("https://example.com", "g1", None, "u1")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalService(_)));
    }

    #[test]
    fn test_normalize_tag_names() {
        let names = vec![
            " a ".to_string(),
            String::new(),
            "b".to_string(),
            "a".to_string(),
        ];
        assert_eq!(normalize_tag_names(&names), vec!["a", "b"]);
    }
}
