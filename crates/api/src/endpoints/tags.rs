//! Tag endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use list_common::AppResult;
use list_core::{CopyTagsResult, CreateTagInput, UpdateTagInput};
use list_db::entities::tag;
use serde::Deserialize;

use super::content::load_for_member;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Attach tag request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachTagRequest {
    pub tag_id: String,
}

/// Copy tags request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTagsRequest {
    pub target_id: String,
}

/// The caller's tags.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<tag::Model>>> {
    let tags = state.tag_service.list(&user.id).await?;
    Ok(ApiResponse::ok(tags))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateTagInput>,
) -> AppResult<ApiResponse<tag::Model>> {
    let tag = state.tag_service.create(&user.id, input).await?;
    Ok(ApiResponse::created(tag))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTagInput>,
) -> AppResult<ApiResponse<tag::Model>> {
    let tag = state.tag_service.update(&user.id, &id, input).await?;
    Ok(ApiResponse::ok(tag))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.tag_service.delete(&user.id, &id).await?;
    Ok(no_content())
}

/// Tags on an item.
async fn content_tags(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<tag::Model>>> {
    let item = load_for_member(&state, &user.id, &id).await?;
    Ok(ApiResponse::ok(item.tags))
}

async fn attach(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AttachTagRequest>,
) -> AppResult<StatusCode> {
    load_for_member(&state, &user.id, &id).await?;
    state.tag_service.attach(&user.id, &id, &req.tag_id).await?;
    Ok(no_content())
}

async fn detach(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    load_for_member(&state, &user.id, &id).await?;
    state.tag_service.detach(&id, &tag_id).await?;
    Ok(no_content())
}

/// Copy every tag of an item onto another item.
async fn copy(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CopyTagsRequest>,
) -> AppResult<ApiResponse<CopyTagsResult>> {
    load_for_member(&state, &user.id, &id).await?;
    load_for_member(&state, &user.id, &req.target_id).await?;

    let result = state.tag_service.copy_tags(&id, &req.target_id).await?;
    Ok(ApiResponse::ok(result))
}

/// Routes under `/tags`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", patch(update).delete(remove))
}

/// Routes under `/content/{id}/tags`.
pub fn content_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/tags", get(content_tags).post(attach))
        .route("/{id}/tags/copy", post(copy))
        .route("/{id}/tags/{tag_id}", delete(detach))
}
