//! Lambda router endpoints.

use axum::{Json, Router, extract::State, routing::post};
use list_common::AppResult;
use list_core::lambda::{BookSearch, BookSearchResult, InvokeRequest, InvokeResponse, VideoInfo};
use serde::Deserialize;
use serde_json::Value;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Request carrying a single URL.
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

/// Text generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
}

/// Fill in `payload.userId` with the caller when the payload leaves it out.
fn with_caller(mut request: InvokeRequest, user_id: &str) -> InvokeRequest {
    if let Value::Object(payload) = &mut request.payload {
        payload
            .entry("userId")
            .or_insert_with(|| Value::String(user_id.to_string()));
    }
    request
}

/// Pass an invoke request through to the lambda router.
async fn invoke(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> AppResult<ApiResponse<InvokeResponse>> {
    let response = state
        .lambda_service
        .invoke(with_caller(request, &user.id))
        .await?;
    Ok(ApiResponse::ok(response))
}

async fn youtube_playlist(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> AppResult<ApiResponse<Vec<VideoInfo>>> {
    let videos = state.lambda_service.youtube_playlist(&req.url).await?;
    Ok(ApiResponse::ok(videos))
}

async fn book_search(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(search): Json<BookSearch>,
) -> AppResult<ApiResponse<BookSearchResult>> {
    let result = state.lambda_service.libgen_search(search).await?;
    Ok(ApiResponse::ok(result))
}

async fn generate(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> AppResult<ApiResponse<Value>> {
    let output = state
        .lambda_service
        .llm_generate(&req.prompt, req.system.as_deref())
        .await?;
    Ok(ApiResponse::ok(output))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/youtube-playlist", post(youtube_playlist))
        .route("/book-search", post(book_search))
        .route("/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_caller_fills_missing_user() {
        let request = with_caller(InvokeRequest::new("seo-extract", json!({ "url": "x" })), "u1");
        assert_eq!(request.payload["userId"], "u1");

        let request = with_caller(
            InvokeRequest::new("seo-extract", json!({ "userId": "other" })),
            "u1",
        );
        assert_eq!(request.payload["userId"], "other");

        let request = with_caller(InvokeRequest::new("list-jobs", Value::Null), "u1");
        assert_eq!(request.payload, Value::Null);
    }
}
