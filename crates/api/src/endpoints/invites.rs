//! Invite code endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use list_common::AppResult;
use list_core::CreateInviteCodeInput;
use list_db::entities::user_invite_code;
use list_db::repositories::InviteStats;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// The caller's invite codes.
async fn list_codes(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<user_invite_code::Model>>> {
    let codes = state.group_service.invite_codes(&user.id).await?;
    Ok(ApiResponse::ok(codes))
}

async fn create_code(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateInviteCodeInput>,
) -> AppResult<ApiResponse<user_invite_code::Model>> {
    let code = state.group_service.create_invite_code(&user.id, input).await?;
    Ok(ApiResponse::created(code))
}

async fn deactivate_code(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .group_service
        .deactivate_invite_code(&user.id, &id)
        .await?;
    Ok(no_content())
}

async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<InviteStats>> {
    let stats = state.group_service.invite_stats(&user.id).await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/codes", get(list_codes).post(create_code))
        .route("/codes/{id}", delete(deactivate_code))
        .route("/stats", get(stats))
}
