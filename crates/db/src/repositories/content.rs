//! Content repository.
//!
//! Listing reads the hierarchy from `content_relationships`; writes still
//! go through `content.parent_content_id` and the sync trigger maintains
//! the edge table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use list_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set, Statement,
    sea_query::SimpleExpr,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use super::tag::TagRepository;
use crate::entities::{Content, ContentRelationship, content, content_relationship, tag};
use crate::listing::{self, TagFilter, ViewMode};

/// Default number of rows requested from the search functions.
pub const DEFAULT_SEARCH_SUPERSET: u64 = 200;

/// A content row with its tags and number of direct children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentWithMeta {
    #[serde(flatten)]
    pub content: content::Model,
    pub tags: Vec<tag::Model>,
    pub child_count: i64,
}

/// Input for [`ContentRepository::create_content`].
#[derive(Debug, Clone, Default)]
pub struct NewContent {
    /// Explicit ID; generated when `None`.
    pub id: Option<String>,
    pub content_type: String,
    pub data: String,
    pub group_id: String,
    pub user_id: String,
    pub parent_content_id: Option<String>,
    pub metadata: Option<Value>,
}

/// Partial update for [`ContentRepository::update_content`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub metadata: Option<Value>,
}

impl ContentPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_none() && self.content_type.is_none() && self.metadata.is_none()
    }
}

#[derive(Debug, FromQueryResult)]
struct ChildCountRow {
    from_content_id: String,
    count: i64,
}

/// Repository for content and its hierarchy.
#[derive(Clone)]
pub struct ContentRepository {
    db: Arc<DatabaseConnection>,
    tags: TagRepository,
    id_gen: IdGenerator,
    search_superset: u64,
}

impl ContentRepository {
    /// Create a new content repository.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            tags: TagRepository::new(Arc::clone(&db)),
            db,
            id_gen: IdGenerator::new(),
            search_superset: DEFAULT_SEARCH_SUPERSET,
        }
    }

    /// Override how many rows search asks the database for before
    /// filtering and slicing locally.
    #[must_use]
    pub const fn with_search_superset(mut self, superset: u64) -> Self {
        self.search_superset = superset;
        self
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    // ==================== Listing ====================

    /// Children of `parent_id` (roots when `None`) within a group.
    pub async fn get_content_by_parent(
        &self,
        group_id: &str,
        parent_id: Option<&str>,
        offset: u64,
        limit: u64,
        view_mode: ViewMode,
    ) -> AppResult<Vec<ContentWithMeta>> {
        let query = Self::children_query(group_id, parent_id);
        let mut page = order_by_view(query, view_mode)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if view_mode == ViewMode::Random {
            listing::order_page(&mut page, view_mode, group_id, offset);
        }

        self.attach_meta(page).await
    }

    /// Fetch a single item with its tags and child count.
    pub async fn get_content_by_id(&self, id: &str) -> AppResult<Option<ContentWithMeta>> {
        let Some(row) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut with_meta = self.attach_meta(vec![row]).await?;
        Ok(with_meta.pop())
    }

    /// Fetch the bare content row.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<content::Model>> {
        Content::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch bare rows for the given IDs, in no particular order.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<content::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Content::find()
            .filter(content::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_row(&self, id: &str) -> AppResult<content::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound(id.to_string()))
    }

    // ==================== Writes ====================

    /// Insert a content row.
    ///
    /// Only `content` is written; the relationship edge is created by the
    /// `sync_content_relationship` trigger from `parent_content_id`.
    pub async fn create_content(&self, input: NewContent) -> AppResult<content::Model> {
        let now = Utc::now();
        let model = content::ActiveModel {
            id: Set(input.id.unwrap_or_else(|| self.id_gen.generate())),
            content_type: Set(input.content_type),
            data: Set(input.data),
            group_id: Set(input.group_id),
            user_id: Set(input.user_id),
            parent_content_id: Set(input.parent_content_id),
            metadata: Set(input.metadata),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update data, type and/or metadata in place.
    pub async fn update_content(&self, id: &str, patch: ContentPatch) -> AppResult<content::Model> {
        let existing = self.get_row(id).await?;
        if patch.is_empty() {
            return Ok(existing);
        }

        let mut active: content::ActiveModel = existing.into();
        if let Some(data) = patch.data {
            active.data = Set(data);
        }
        if let Some(content_type) = patch.content_type {
            active.content_type = Set(content_type);
        }
        if let Some(metadata) = patch.metadata {
            active.metadata = Set(Some(metadata));
        }
        active.updated_at = Set(Utc::now().into());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Merge the keys of `patch` into the existing metadata object.
    pub async fn update_content_metadata(
        &self,
        id: &str,
        patch: Value,
    ) -> AppResult<content::Model> {
        let existing = self.get_row(id).await?;
        let merged = merge_metadata(existing.metadata.clone(), patch)?;

        let mut active: content::ActiveModel = existing.into();
        active.metadata = Set(Some(merged));
        active.updated_at = Set(Utc::now().into());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete one item. Its edges, tag links and children cascade.
    pub async fn delete_content(&self, id: &str) -> AppResult<()> {
        Content::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete many items, returning how many rows went away.
    pub async fn delete_contents(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Content::delete_many()
            .filter(content::Column::Id.is_in(ids.iter().cloned()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Mark content public or private under `metadata.sharing`.
    pub async fn toggle_content_sharing(
        &self,
        id: &str,
        is_public: bool,
    ) -> AppResult<content::Model> {
        let shared_at = is_public.then(|| Utc::now().to_rfc3339());
        self.update_content_metadata(
            id,
            json!({ "sharing": { "is_public": is_public, "shared_at": shared_at } }),
        )
        .await
    }

    // ==================== Search ====================

    /// Search a group's content, fuzzy first and substring as fallback.
    ///
    /// The database returns up to `search_superset` hits; parent filtering,
    /// view-mode ordering and pagination then happen locally.
    pub async fn search_content(
        &self,
        group_id: &str,
        query: &str,
        parent_id: Option<&str>,
        offset: u64,
        limit: u64,
        view_mode: ViewMode,
    ) -> AppResult<Vec<ContentWithMeta>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let hits = match self.search_fuzzy(group_id, query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, group_id, "Fuzzy search failed, falling back to exact search");
                self.search_exact(group_id, query).await?
            }
        };

        let mut hits = self.retain_under_parent(hits, parent_id).await?;
        listing::order_page(&mut hits, view_mode, group_id, offset);
        let page = listing::paginate(hits, offset, limit);

        self.attach_meta(page).await
    }

    /// Trigram-ranked search via `search_content_fuzzy`.
    pub async fn search_fuzzy(&self, group_id: &str, query: &str) -> AppResult<Vec<content::Model>> {
        self.call_search_function("search_content_fuzzy", group_id, query)
            .await
    }

    /// Case-insensitive substring search via `search_content`.
    pub async fn search_exact(&self, group_id: &str, query: &str) -> AppResult<Vec<content::Model>> {
        self.call_search_function("search_content", group_id, query)
            .await
    }

    async fn call_search_function(
        &self,
        function: &str,
        group_id: &str,
        query: &str,
    ) -> AppResult<Vec<content::Model>> {
        let sql = format!("SELECT * FROM {function}($1, $2, $3)");
        let limit = i32::try_from(self.search_superset).unwrap_or(i32::MAX);

        Content::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                [group_id.into(), query.into(), limit.into()],
            ))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Keep only hits whose inbound edge points at `parent_id`.
    async fn retain_under_parent(
        &self,
        hits: Vec<content::Model>,
        parent_id: Option<&str>,
    ) -> AppResult<Vec<content::Model>> {
        if hits.is_empty() {
            return Ok(hits);
        }

        let edges: HashMap<String, Option<String>> = ContentRelationship::find()
            .filter(
                content_relationship::Column::ToContentId
                    .is_in(hits.iter().map(|c| c.id.clone())),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|edge| (edge.to_content_id, edge.from_content_id))
            .collect();

        Ok(hits
            .into_iter()
            .filter(|c| {
                let parent = edges
                    .get(&c.id)
                    .cloned()
                    .unwrap_or_else(|| c.parent_content_id.clone());
                parent.as_deref() == parent_id
            })
            .collect())
    }

    // ==================== Tag Filtering ====================

    /// List a parent's children restricted by a tag filter.
    ///
    /// An exclude-only filter yields nothing; an empty filter is a plain
    /// listing.
    pub async fn filter_content_by_tags(
        &self,
        group_id: &str,
        parent_id: Option<&str>,
        filter: &TagFilter,
        offset: u64,
        limit: u64,
        view_mode: ViewMode,
    ) -> AppResult<Vec<ContentWithMeta>> {
        if filter.is_exclude_only() {
            return Ok(vec![]);
        }
        if filter.is_empty() {
            return self
                .get_content_by_parent(group_id, parent_id, offset, limit, view_mode)
                .await;
        }

        let with_all = self.tags.content_ids_with_all_tags(&filter.include).await?;
        if with_all.is_empty() {
            return Ok(vec![]);
        }
        let excluded = self.tags.content_ids_with_any_tags(&filter.exclude).await?;
        let candidates = subtract_ids(with_all, &excluded);
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let query = Self::children_query(group_id, parent_id)
            .filter(content::Column::Id.is_in(candidates));
        let mut page = order_by_view(query, view_mode)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if view_mode == ViewMode::Random {
            listing::order_page(&mut page, view_mode, group_id, offset);
        }

        self.attach_meta(page).await
    }

    // ==================== Hierarchy ====================

    /// Number of direct children per ID. IDs without children map to 0.
    pub async fn get_child_counts(&self, ids: &[String]) -> AppResult<HashMap<String, i64>> {
        let mut counts: HashMap<String, i64> = ids.iter().map(|id| (id.clone(), 0)).collect();
        if ids.is_empty() {
            return Ok(counts);
        }

        let rows = ContentRelationship::find()
            .select_only()
            .column(content_relationship::Column::FromContentId)
            .column_as(content_relationship::Column::Id.count(), "count")
            .filter(content_relationship::Column::FromContentId.is_in(ids.iter().cloned()))
            .group_by(content_relationship::Column::FromContentId)
            .into_model::<ChildCountRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for row in rows {
            counts.insert(row.from_content_id, row.count);
        }

        Ok(counts)
    }

    /// Breadcrumb chain above `id`, root first. `id` itself is excluded.
    pub async fn get_ancestors(&self, id: &str, limit: u64) -> AppResult<Vec<content::Model>> {
        let sql = r"
            WITH RECURSIVE chain AS (
                SELECT r.from_content_id AS ancestor_id, 1 AS depth
                FROM content_relationships r
                WHERE r.to_content_id = $1

                UNION ALL

                SELECT r.from_content_id, chain.depth + 1
                FROM content_relationships r
                INNER JOIN chain ON r.to_content_id = chain.ancestor_id
                WHERE chain.ancestor_id IS NOT NULL AND chain.depth < $2
            )
            SELECT c.*
            FROM chain
            INNER JOIN content c ON c.id = chain.ancestor_id
            ORDER BY chain.depth DESC
        ";
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        Content::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [id.into(), limit.into()],
            ))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Helpers ====================

    fn children_query(group_id: &str, parent_id: Option<&str>) -> Select<Content> {
        Content::find()
            .join(
                JoinType::InnerJoin,
                content_relationship::Relation::To.def().rev(),
            )
            .filter(content::Column::GroupId.eq(group_id))
            .filter(parent_condition(parent_id))
    }

    /// Attach tags and child counts, preserving the order of `rows`.
    pub async fn attach_meta(&self, rows: Vec<content::Model>) -> AppResult<Vec<ContentWithMeta>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = rows.iter().map(|c| c.id.clone()).collect();
        let mut tags = self.tags.tags_for_contents(&ids).await?;
        let counts = self.get_child_counts(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|content| ContentWithMeta {
                tags: tags.remove(&content.id).unwrap_or_default(),
                child_count: counts.get(&content.id).copied().unwrap_or(0),
                content,
            })
            .collect())
    }
}

fn parent_condition(parent_id: Option<&str>) -> SimpleExpr {
    match parent_id {
        Some(parent) => content_relationship::Column::FromContentId.eq(parent),
        None => content_relationship::Column::FromContentId.is_null(),
    }
}

/// Push the view mode's ordering into SQL. Random pages are fetched
/// newest first and shuffled afterwards.
fn order_by_view(query: Select<Content>, view_mode: ViewMode) -> Select<Content> {
    match view_mode {
        ViewMode::Chronological | ViewMode::Random => query
            .order_by_desc(content::Column::CreatedAt)
            .order_by_desc(content::Column::Id),
        ViewMode::Oldest => query
            .order_by_asc(content::Column::CreatedAt)
            .order_by_asc(content::Column::Id),
        ViewMode::Alphabetical => query
            .order_by_asc(content::Column::Data)
            .order_by_asc(content::Column::CreatedAt)
            .order_by_asc(content::Column::Id),
    }
}

/// `ids` minus `excluded`, keeping the original order.
fn subtract_ids(ids: Vec<String>, excluded: &[String]) -> Vec<String> {
    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    ids.into_iter()
        .filter(|id| !excluded.contains(id.as_str()))
        .collect()
}

/// Shallow merge of `patch` into `existing`. Both must be JSON objects
/// (a missing or null `existing` counts as empty).
fn merge_metadata(existing: Option<Value>, patch: Value) -> AppResult<Value> {
    let Value::Object(patch) = patch else {
        return Err(AppError::Validation(
            "metadata patch must be a JSON object".to_string(),
        ));
    };

    let mut base = match existing {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            return Err(AppError::Validation(
                "existing metadata is not a JSON object".to_string(),
            ));
        }
    };

    for (key, value) in patch {
        base.insert(key, value);
    }

    Ok(Value::Object(base))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::content_tag;
    use crate::listing::tests::content_at;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::collections::BTreeMap;

    type MockRow = BTreeMap<&'static str, sea_orm::Value>;

    fn child_count_row(from: &str, count: i64) -> MockRow {
        maplit::btreemap! {
            "from_content_id" => sea_orm::Value::from(from.to_string()),
            "count" => sea_orm::Value::BigInt(Some(count)),
        }
    }

    fn edge(to: &str, from: Option<&str>) -> content_relationship::Model {
        content_relationship::Model {
            id: format!("edge-{to}"),
            from_content_id: from.map(str::to_string),
            to_content_id: to.to_string(),
            display_order: 0,
            created_at: Utc::now().into(),
        }
    }

    fn ids(items: &[ContentWithMeta]) -> Vec<&str> {
        items.iter().map(|c| c.content.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_content_by_parent_attaches_meta() {
        let rows = vec![content_at("c2", "second", 2), content_at("c1", "first", 1)];
        let link = content_tag::Model {
            content_id: "c1".to_string(),
            tag_id: "t1".to_string(),
            created_at: Utc::now().into(),
        };
        let work = tag::Model {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            name: "work".to_string(),
            color: None,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([rows])
                .append_query_results([[link]])
                .append_query_results([[work]])
                .append_query_results([[child_count_row("c2", 3)]])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let result = repo
            .get_content_by_parent("g1", None, 0, 20, ViewMode::Chronological)
            .await
            .unwrap();

        assert_eq!(ids(&result), ["c2", "c1"]);
        assert_eq!(result[0].child_count, 3);
        assert_eq!(result[1].child_count, 0);
        assert_eq!(result[1].tags[0].name, "work");
        assert!(result[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_get_content_by_parent_filters_on_edges() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<content::Model>::new()])
                .append_query_results([Vec::<content::Model>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(Arc::clone(&db));
        repo.get_content_by_parent("g1", None, 0, 20, ViewMode::Oldest)
            .await
            .unwrap();
        repo.get_content_by_parent("g1", Some("p1"), 0, 20, ViewMode::Alphabetical)
            .await
            .unwrap();
        drop(repo);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let roots = format!("{:?}", log[0]);
        let children = format!("{:?}", log[1]);
        assert!(roots.contains("content_relationships"));
        assert!(roots.contains("IS NULL"));
        assert!(roots.contains("ASC"));
        assert!(children.contains("from_content_id"));
        assert!(!children.contains("IS NULL"));
    }

    #[tokio::test]
    async fn test_random_mode_is_stable_for_same_offset() {
        let page: Vec<_> = (0..8)
            .map(|i| content_at(&format!("c{i}"), "x", 10 - i))
            .collect();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([page.clone()])
                .append_query_results([Vec::<content_tag::Model>::new()])
                .append_query_results([Vec::<MockRow>::new()])
                .append_query_results([page])
                .append_query_results([Vec::<content_tag::Model>::new()])
                .append_query_results([Vec::<MockRow>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let first = repo
            .get_content_by_parent("g1", None, 0, 8, ViewMode::Random)
            .await
            .unwrap();
        let second = repo
            .get_content_by_parent("g1", None, 0, 8, ViewMode::Random)
            .await
            .unwrap();

        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.len(), 8);
    }

    #[tokio::test]
    async fn test_get_content_by_id_missing_is_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<content::Model>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        assert!(repo.get_content_by_id("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_then_get_is_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([Vec::<content::Model>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        repo.delete_content("c1").await.unwrap();
        assert!(repo.get_content_by_id("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_falls_back_to_exact() {
        let hit = content_at("c1", "groceries", 1);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom(
                    "function similarity(text, text) does not exist".to_string(),
                )])
                .append_query_results([[hit]])
                .append_query_results([[edge("c1", None)]])
                .append_query_results([Vec::<content_tag::Model>::new()])
                .append_query_results([Vec::<MockRow>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(Arc::clone(&db));
        let result = repo
            .search_content("g1", "groc", None, 0, 20, ViewMode::Chronological)
            .await
            .unwrap();
        drop(repo);

        assert_eq!(ids(&result), ["c1"]);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert!(format!("{:?}", log[0]).contains("search_content_fuzzy"));
        let second = format!("{:?}", log[1]);
        assert!(second.contains("search_content("));
        assert!(!second.contains("fuzzy"));
    }

    #[tokio::test]
    async fn test_search_filters_by_parent_and_paginates() {
        let hits = vec![
            content_at("a", "apple pie", 3),
            content_at("b", "apple tart", 2),
            content_at("c", "apple juice", 1),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([hits])
                .append_query_results([[
                    edge("a", Some("p1")),
                    edge("b", None),
                    edge("c", Some("p1")),
                ]])
                .append_query_results([Vec::<content_tag::Model>::new()])
                .append_query_results([Vec::<MockRow>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let result = repo
            .search_content("g1", "apple", Some("p1"), 1, 5, ViewMode::Chronological)
            .await
            .unwrap();

        assert_eq!(ids(&result), ["c"]);
    }

    #[tokio::test]
    async fn test_search_blank_query_is_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = ContentRepository::new(db);
        let result = repo
            .search_content("g1", "   ", None, 0, 20, ViewMode::Chronological)
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_exclude_only_filter_returns_empty_without_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = ContentRepository::new(db);
        let filter = TagFilter::new(vec![], vec!["done".to_string()]);
        let result = repo
            .filter_content_by_tags("g1", None, &filter, 0, 20, ViewMode::Chronological)
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_tag_filter_include_and_exclude() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // ids carrying every include tag
                .append_query_results([[
                    maplit::btreemap! { "content_id" => sea_orm::Value::from("a") },
                    maplit::btreemap! { "content_id" => sea_orm::Value::from("b") },
                    maplit::btreemap! { "content_id" => sea_orm::Value::from("c") },
                ]])
                // ids carrying any exclude tag
                .append_query_results([[
                    maplit::btreemap! { "content_id" => sea_orm::Value::from("b") },
                ]])
                .append_query_results([[content_at("c", "x", 2), content_at("a", "y", 1)]])
                .append_query_results([Vec::<content_tag::Model>::new()])
                .append_query_results([Vec::<MockRow>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(Arc::clone(&db));
        let filter = TagFilter::new(
            vec!["work".to_string(), "urgent".to_string()],
            vec!["done".to_string()],
        );
        let result = repo
            .filter_content_by_tags("g1", None, &filter, 0, 20, ViewMode::Chronological)
            .await
            .unwrap();
        drop(repo);

        assert_eq!(ids(&result), ["c", "a"]);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let listing_sql = format!("{:?}", log[2]);
        assert!(listing_sql.contains("\"a\"") || listing_sql.contains("String(Some(\"a\"))"));
        assert!(!listing_sql.contains("String(Some(\"b\"))"));
    }

    #[test]
    fn test_subtract_ids() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            subtract_ids(ids, &["b".to_string()]),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_child_counts_default_to_zero() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[child_count_row("p1", 2)]])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let counts = repo
            .get_child_counts(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(counts["p1"], 2);
        assert_eq!(counts["p2"], 0);
    }

    #[tokio::test]
    async fn test_get_ancestors_uses_recursive_cte() {
        let chain = vec![content_at("root", "root", 0), content_at("mid", "mid", 1)];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([chain])
                .into_connection(),
        );

        let repo = ContentRepository::new(Arc::clone(&db));
        let ancestors = repo.get_ancestors("leaf", 50).await.unwrap();
        drop(repo);

        assert_eq!(ancestors[0].id, "root");
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert!(format!("{:?}", log[0]).contains("WITH RECURSIVE"));
    }

    #[test]
    fn test_merge_metadata() {
        let merged = merge_metadata(
            Some(json!({ "a": 1, "b": { "x": 1 } })),
            json!({ "b": { "y": 2 }, "c": true }),
        )
        .unwrap();
        assert_eq!(merged, json!({ "a": 1, "b": { "y": 2 }, "c": true }));

        assert_eq!(
            merge_metadata(None, json!({ "k": "v" })).unwrap(),
            json!({ "k": "v" })
        );
        assert!(merge_metadata(None, json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_toggle_content_sharing_writes_metadata() {
        let mut existing = content_at("c1", "note", 0);
        existing.metadata = Some(json!({ "source": "web" }));
        let mut updated = existing.clone();
        updated.metadata = Some(json!({
            "source": "web",
            "sharing": { "is_public": true, "shared_at": "2025-01-01T00:00:00+00:00" }
        }));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[updated]])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let result = repo.toggle_content_sharing("c1", true).await.unwrap();

        let metadata = result.metadata.unwrap();
        assert_eq!(metadata["source"], "web");
        assert_eq!(metadata["sharing"]["is_public"], true);
    }

    #[tokio::test]
    async fn test_update_missing_content_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<content::Model>::new()])
                .into_connection(),
        );

        let repo = ContentRepository::new(db);
        let err = repo
            .update_content(
                "nope",
                ContentPatch {
                    data: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ContentNotFound(_)));
    }
}
