//! Lambda RPC client.
//!
//! Every non-CRUD backend operation goes through one endpoint that routes on
//! an action name: `{action, payload, sync?}` in,
//! `{success, data?, error?, queued?, job_id?}` out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use list_common::config::LambdaConfig;
use list_common::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

/// Action names understood by the lambda router.
pub mod actions {
    pub const SEO_EXTRACT: &str = "seo-extract";
    pub const YOUTUBE_PLAYLIST: &str = "youtube-playlist";
    pub const YOUTUBE_SUBTITLES: &str = "youtube-subtitles";
    pub const TMDB_SEARCH: &str = "tmdb-search";
    pub const LIBGEN_SEARCH: &str = "libgen-search";
    pub const LLM_GENERATE: &str = "llm-generate";
    pub const SCREENSHOT_QUEUE: &str = "screenshot-queue";
    pub const LIST_JOBS: &str = "list-jobs";
    pub const CANCEL_JOB: &str = "cancel-job";
}

/// Request sent to the lambda endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
}

impl InvokeRequest {
    /// Build a request for `action`.
    pub fn new(action: &str, payload: Value) -> Self {
        Self {
            action: action.to_string(),
            payload,
            sync: None,
        }
    }

    /// Ask the router to run synchronously (`true`) or queue the work.
    #[must_use]
    pub const fn sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }
}

/// Response from the lambda endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl InvokeResponse {
    /// Turn `success == false` into an error.
    pub fn into_result(self) -> AppResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::ExternalService(
                self.error
                    .unwrap_or_else(|| "Lambda invocation failed".to_string()),
            ))
        }
    }

    /// Decode `data` into a typed payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> AppResult<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| AppError::ExternalService("Lambda response has no data".to_string()))?;
        serde_json::from_value(data).map_err(|e| {
            AppError::ExternalService(format!("Failed to parse lambda response: {e}"))
        })
    }
}

/// Seam between services and the lambda transport.
#[async_trait]
pub trait LambdaInvoker: Send + Sync {
    /// Invoke an action. Transport and backend failures are errors.
    async fn invoke(&self, request: InvokeRequest) -> AppResult<InvokeResponse>;
}

/// HTTP implementation of [`LambdaInvoker`].
#[derive(Clone)]
pub struct LambdaClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LambdaClient {
    /// Create a client from configuration.
    pub fn new(config: &LambdaConfig) -> AppResult<Self> {
        Url::parse(&config.endpoint).map_err(|e| {
            AppError::Config(format!("Invalid lambda endpoint {}: {e}", config.endpoint))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LambdaInvoker for LambdaClient {
    async fn invoke(&self, request: InvokeRequest) -> AppResult<InvokeResponse> {
        debug!(action = %request.action, sync = ?request.sync, "Invoking lambda");

        let mut builder = self.http_client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::ExternalService(format!("Lambda request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(action = %request.action, %status, "Lambda returned an error status");
            return Err(AppError::ExternalService(format!(
                "Lambda error: {status} - {body}"
            )));
        }

        let body: InvokeResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse lambda response: {e}"))
        })?;

        body.into_result()
    }
}

/// A single video thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// A video from a playlist enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Duration in seconds.
    pub duration: i64,
    pub author: String,
    pub channel_id: String,
    pub channel_handle: String,
    pub description: String,
    pub views: u64,
    /// ISO 8601 date.
    pub publish_date: String,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct PlaylistData {
    #[serde(default)]
    videos: Vec<VideoInfo>,
}

/// A book search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookInfo {
    pub id: String,
    pub author: String,
    pub title: String,
    pub publisher: String,
    pub year: String,
    pub pages: String,
    pub language: String,
    pub size: String,
    pub extension: String,
    pub mirrors: Vec<String>,
}

/// Book search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSearch {
    pub query: String,
    #[serde(default)]
    pub search_type: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub filters: std::collections::BTreeMap<String, String>,
}

impl BookSearch {
    /// Search with default type and topics.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
        .with_defaults()
    }

    /// Fill in `search_type = "default"` and `topics = ["libgen"]` when unset.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.search_type.is_empty() {
            self.search_type = "default".to_string();
        }
        if self.topics.is_empty() {
            self.topics = vec!["libgen".to_string()];
        }
        self
    }
}

/// Book search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookSearchResult {
    pub books: Vec<BookInfo>,
    pub query: String,
}

/// Typed helpers over a [`LambdaInvoker`], one per action.
#[derive(Clone)]
pub struct LambdaService {
    invoker: Arc<dyn LambdaInvoker>,
}

impl LambdaService {
    /// Create a new lambda service.
    #[must_use]
    pub fn new(invoker: Arc<dyn LambdaInvoker>) -> Self {
        Self { invoker }
    }

    /// Raw invoke, used by the proxy endpoint.
    pub async fn invoke(&self, request: InvokeRequest) -> AppResult<InvokeResponse> {
        if request.action.trim().is_empty() {
            return Err(AppError::Validation("action is required".to_string()));
        }
        self.invoker.invoke(request).await?.into_result()
    }

    /// Queue SEO extraction of `url`; the worker creates the content row.
    pub async fn seo_extract(
        &self,
        url: &str,
        group_id: &str,
        parent_id: Option<&str>,
        user_id: &str,
    ) -> AppResult<InvokeResponse> {
        let url = require_url(url)?;
        self.invoke(
            InvokeRequest::new(
                actions::SEO_EXTRACT,
                json!({
                    "url": url,
                    "groupId": group_id,
                    "userId": user_id,
                    "parentContentId": parent_id,
                }),
            )
            .sync(false),
        )
        .await
    }

    /// Enumerate the videos of a playlist.
    pub async fn youtube_playlist(&self, url: &str) -> AppResult<Vec<VideoInfo>> {
        let url = require_url(url)?;
        let response = self
            .invoke(InvokeRequest::new(actions::YOUTUBE_PLAYLIST, json!({ "url": url })).sync(true))
            .await?;
        Ok(response.data_as::<PlaylistData>()?.videos)
    }

    /// Fetch subtitles for a video.
    pub async fn youtube_subtitles(&self, url: &str, language: Option<&str>) -> AppResult<Value> {
        let url = require_url(url)?;
        let response = self
            .invoke(
                InvokeRequest::new(
                    actions::YOUTUBE_SUBTITLES,
                    json!({ "url": url, "language": language }),
                )
                .sync(true),
            )
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Search movies and shows.
    pub async fn tmdb_search(&self, query: &str, media_type: Option<&str>) -> AppResult<Value> {
        let query = require_text("query", query)?;
        let response = self
            .invoke(
                InvokeRequest::new(
                    actions::TMDB_SEARCH,
                    json!({ "query": query, "mediaType": media_type }),
                )
                .sync(true),
            )
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Search books.
    pub async fn libgen_search(&self, search: BookSearch) -> AppResult<BookSearchResult> {
        require_text("query", &search.query)?;
        let search = search.with_defaults();
        let payload = serde_json::to_value(&search)
            .map_err(|e| AppError::Internal(format!("Failed to encode search: {e}")))?;
        let response = self
            .invoke(InvokeRequest::new(actions::LIBGEN_SEARCH, payload).sync(true))
            .await?;
        response.data_as()
    }

    /// Generate text with an LLM.
    pub async fn llm_generate(&self, prompt: &str, system: Option<&str>) -> AppResult<Value> {
        let prompt = require_text("prompt", prompt)?;
        let response = self
            .invoke(
                InvokeRequest::new(
                    actions::LLM_GENERATE,
                    json!({ "prompt": prompt, "system": system }),
                )
                .sync(true),
            )
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Queue a screenshot of `url` for a content item.
    pub async fn queue_screenshot(
        &self,
        url: &str,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<InvokeResponse> {
        let url = require_url(url)?;
        self.invoke(
            InvokeRequest::new(
                actions::SCREENSHOT_QUEUE,
                json!({ "url": url, "contentId": content_id, "userId": user_id }),
            )
            .sync(false),
        )
        .await
    }

    /// Jobs known to the worker side for a user.
    pub async fn list_jobs(&self, user_id: &str) -> AppResult<Value> {
        let response = self
            .invoke(InvokeRequest::new(actions::LIST_JOBS, json!({ "userId": user_id })).sync(true))
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Ask the worker side to cancel a job.
    pub async fn cancel_job(&self, job_id: &str) -> AppResult<InvokeResponse> {
        let job_id = require_text("jobId", job_id)?;
        self.invoke(InvokeRequest::new(actions::CANCEL_JOB, json!({ "jobId": job_id })).sync(true))
            .await
    }
}

fn require_text<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

fn require_url(value: &str) -> AppResult<String> {
    let value = require_text("url", value)?;
    let url = Url::parse(value).map_err(|e| AppError::Validation(format!("Invalid url: {e}")))?;
    Ok(url.to_string())
}
