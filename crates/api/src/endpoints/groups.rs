//! Group endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use list_common::AppResult;
use list_core::invite_graph::InviteTree;
use list_core::{CreateGroupInput, JoinGroupInput};
use list_db::entities::{group, group_membership};
use list_db::repositories::JoinGroupResult;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

// ==================== Handlers ====================

/// Groups the caller belongs to.
async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<group::Model>>> {
    let groups = state.group_service.my_groups(&user.id).await?;
    Ok(ApiResponse::ok(groups))
}

/// Create a new group owned by the caller.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateGroupInput>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.create(&user.id, input).await?;
    Ok(ApiResponse::created(group))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.get(&user.id, &id).await?;
    Ok(ApiResponse::ok(group))
}

async fn rename(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CreateGroupInput>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.rename(&user.id, &id, input).await?;
    Ok(ApiResponse::ok(group))
}

async fn members(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<group_membership::Model>>> {
    let members = state.group_service.members(&user.id, &id).await?;
    Ok(ApiResponse::ok(members))
}

/// Join with a group join code or a user invite code.
async fn join(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<JoinGroupInput>,
) -> AppResult<ApiResponse<JoinGroupResult>> {
    let result = state.group_service.join(&user.id, input).await?;
    Ok(ApiResponse::ok(result))
}

async fn leave(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.group_service.leave(&user.id, &id).await?;
    Ok(no_content())
}

/// Who invited whom, as a tree.
async fn invite_tree(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<InviteTree>> {
    let tree = state.group_service.invite_tree(&user.id, &id).await?;
    Ok(ApiResponse::ok(tree))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(mine).post(create))
        .route("/join", post(join))
        .route("/{id}", get(show).patch(rename))
        .route("/{id}/members", get(members))
        .route("/{id}/leave", post(leave))
        .route("/{id}/invite-tree", get(invite_tree))
}
