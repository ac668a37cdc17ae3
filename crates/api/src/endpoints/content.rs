//! Content endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use list_common::{AppError, AppResult};
use list_core::{CreateContentInput, ListQuery};
use list_db::entities::content;
use list_db::listing::{TagFilter, ViewMode};
use list_db::repositories::{ContentPatch, ContentWithMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

// ==================== Request/Response Types ====================

/// Query for listing children.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContentQuery {
    pub group_id: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
    pub view_mode: Option<String>,
    /// Comma-separated tag IDs every item must carry.
    pub include: Option<String>,
    /// Comma-separated tag IDs no item may carry.
    pub exclude: Option<String>,
}

/// Query for search.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContentQuery {
    pub group_id: String,
    pub q: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
    pub view_mode: Option<String>,
}

/// Bulk delete request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub group_id: String,
    pub ids: Vec<String>,
}

/// Bulk delete response.
#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// Sharing toggle request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingRequest {
    pub is_public: bool,
}

/// SEO extraction request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSeoRequest {
    pub url: String,
    pub group_id: String,
    pub parent_id: Option<String>,
}

/// Queued job reference.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    pub job_id: String,
}

fn split_ids(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn list_query(state: &AppState, offset: u64, limit: Option<u64>, view_mode: Option<&str>) -> ListQuery {
    ListQuery {
        offset,
        limit: state.listing.clamp_limit(limit),
        view_mode: view_mode.map(ViewMode::parse_lenient).unwrap_or_default(),
    }
}

/// Load an item the caller may access through group membership.
pub(super) async fn load_for_member(
    state: &AppState,
    user_id: &str,
    id: &str,
) -> AppResult<ContentWithMeta> {
    let item = state.content_service.get_required(id).await?;
    state
        .group_service
        .ensure_member(&item.content.group_id, user_id)
        .await?;
    Ok(item)
}

// ==================== Handlers ====================

/// List children of a parent, or the roots, with an optional tag filter.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListContentQuery>,
) -> AppResult<ApiResponse<Vec<ContentWithMeta>>> {
    state
        .group_service
        .ensure_member(&query.group_id, &user.id)
        .await?;

    let filter = TagFilter::new(
        split_ids(query.include.as_deref()),
        split_ids(query.exclude.as_deref()),
    );
    let page = list_query(&state, query.offset, query.limit, query.view_mode.as_deref());
    let items = state
        .content_service
        .list(&query.group_id, query.parent_id.as_deref(), &filter, &page)
        .await?;

    Ok(ApiResponse::ok(items))
}

/// Search a group's content.
async fn search(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchContentQuery>,
) -> AppResult<ApiResponse<Vec<ContentWithMeta>>> {
    if query.q.trim().is_empty() {
        return Err(AppError::BadRequest("q must not be empty".to_string()));
    }
    state
        .group_service
        .ensure_member(&query.group_id, &user.id)
        .await?;

    let page = list_query(&state, query.offset, query.limit, query.view_mode.as_deref());
    let items = state
        .content_service
        .search(&query.group_id, &query.q, query.parent_id.as_deref(), &page)
        .await?;

    Ok(ApiResponse::ok(items))
}

/// Show one item.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ContentWithMeta>> {
    let item = load_for_member(&state, &user.id, &id).await?;
    Ok(ApiResponse::ok(item))
}

/// Breadcrumb of an item, root first.
async fn ancestors(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<content::Model>>> {
    load_for_member(&state, &user.id, &id).await?;
    let chain = state.content_service.ancestors(&id).await?;
    Ok(ApiResponse::ok(chain))
}

/// Create an item.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateContentInput>,
) -> AppResult<ApiResponse<ContentWithMeta>> {
    state
        .group_service
        .ensure_member(&input.group_id, &user.id)
        .await?;

    let created = state.content_service.create_with_tags(&user.id, input).await?;
    Ok(ApiResponse::created(created))
}

/// Update data, type or metadata.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ContentPatch>,
) -> AppResult<ApiResponse<content::Model>> {
    load_for_member(&state, &user.id, &id).await?;
    let updated = state.content_service.update(&id, patch).await?;
    Ok(ApiResponse::ok(updated))
}

/// Merge keys into metadata.
async fn update_metadata(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(metadata): Json<Value>,
) -> AppResult<ApiResponse<content::Model>> {
    load_for_member(&state, &user.id, &id).await?;
    let updated = state.content_service.update_metadata(&id, metadata).await?;
    Ok(ApiResponse::ok(updated))
}

/// Delete an item and its subtree.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    load_for_member(&state, &user.id, &id).await?;
    state.content_service.delete(&id).await?;
    Ok(no_content())
}

/// Delete several items of one group.
async fn bulk_delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<ApiResponse<BulkDeleteResponse>> {
    state
        .group_service
        .ensure_member(&req.group_id, &user.id)
        .await?;

    let deleted = state
        .content_service
        .delete_many(&req.group_id, &req.ids)
        .await?;
    Ok(ApiResponse::ok(BulkDeleteResponse { deleted }))
}

/// Make an item public or private.
async fn sharing(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SharingRequest>,
) -> AppResult<ApiResponse<content::Model>> {
    load_for_member(&state, &user.id, &id).await?;
    let updated = state
        .content_service
        .toggle_sharing(&id, req.is_public)
        .await?;
    Ok(ApiResponse::ok(updated))
}

/// Queue SEO extraction for a URL.
async fn extract_seo(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ExtractSeoRequest>,
) -> AppResult<ApiResponse<JobRef>> {
    state
        .group_service
        .ensure_member(&req.group_id, &user.id)
        .await?;

    let job_id = state
        .content_service
        .extract_seo(&req.url, &req.group_id, req.parent_id.as_deref(), &user.id)
        .await?;
    Ok(ApiResponse::ok(JobRef { job_id }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/delete", post(bulk_delete))
        .route("/seo", post(extract_seo))
        .route("/{id}", get(show).patch(update).delete(delete))
        .route("/{id}/ancestors", get(ancestors))
        .route("/{id}/metadata", post(update_metadata))
        .route("/{id}/sharing", post(sharing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids(Some("a, b,,c ")), vec!["a", "b", "c"]);
        assert!(split_ids(Some("")).is_empty());
        assert!(split_ids(None).is_empty());
    }
}
