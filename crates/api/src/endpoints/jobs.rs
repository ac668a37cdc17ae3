//! Processing job endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use list_common::AppResult;
use list_core::lambda::InvokeResponse;
use list_db::entities::content_processing_job::{self, JobStatus};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Job list query.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
}

/// The caller's jobs, newest first.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<ApiResponse<Vec<content_processing_job::Model>>> {
    let jobs = state
        .job_service
        .list(&user.id, query.status, query.limit)
        .await?;
    Ok(ApiResponse::ok(jobs))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<content_processing_job::Model>> {
    let job = state.job_service.get(&user.id, &id).await?;
    Ok(ApiResponse::ok(job))
}

async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<InvokeResponse>> {
    let response = state.job_service.cancel(&user.id, &id).await?;
    Ok(ApiResponse::ok(response))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
}
