//! API integration tests.
//!
//! These drive the full router, middleware included, against a mock
//! database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use list_api::{AppState, JwtAuth, app};
use list_common::config::{AuthConfig, ListingConfig};
use list_common::{AppResult, RetryConfig};
use list_core::lambda::{InvokeRequest, InvokeResponse, LambdaInvoker};
use list_core::{
    ContentService, EventPublisher, GroupService, JobService, JobWatcher, LambdaService,
    RealtimeEvent, TagService, Topic,
};
use list_db::entities::content_processing_job::JobStatus;
use list_db::entities::group_membership::MemberRole;
use list_db::entities::{content, content_processing_job, content_tag, group_membership};
use list_db::repositories::{
    ContentRepository, GroupRepository, InviteRepository, JobRepository, TagRepository,
};
use list_realtime::RealtimeHub;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

#[derive(Default)]
struct StubInvoker {
    requests: Mutex<Vec<InvokeRequest>>,
}

#[async_trait]
impl LambdaInvoker for StubInvoker {
    async fn invoke(&self, request: InvokeRequest) -> AppResult<InvokeResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(InvokeResponse {
            success: true,
            data: Some(json!({ "ok": true })),
            ..InvokeResponse::default()
        })
    }
}

struct TestApp {
    router: Router,
    hub: Arc<RealtimeHub>,
    invoker: Arc<StubInvoker>,
}

fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SECRET.to_string(),
        allow_anonymous: false,
    }
}

fn create_test_app(db: DatabaseConnection) -> TestApp {
    let db = Arc::new(db);
    let hub = Arc::new(RealtimeHub::new());
    let invoker = Arc::new(StubInvoker::default());
    let lambda = LambdaService::new(invoker.clone());

    let content_repo = ContentRepository::new(Arc::clone(&db));
    let tag_repo = TagRepository::new(Arc::clone(&db));
    let group_repo = GroupRepository::new(Arc::clone(&db));
    let invite_repo = InviteRepository::new(Arc::clone(&db));
    let job_repo = JobRepository::new(Arc::clone(&db));

    let state = AppState {
        content_service: ContentService::new(
            content_repo,
            tag_repo.clone(),
            lambda.clone(),
            hub.clone(),
        ),
        tag_service: TagService::new(tag_repo),
        group_service: GroupService::new(group_repo, invite_repo)
            .with_retry_config(RetryConfig::none()),
        job_service: JobService::new(job_repo, lambda.clone(), hub.clone()),
        lambda_service: lambda,
        events: hub.clone(),
        auth: JwtAuth::new(&auth_config()).unwrap(),
        listing: ListingConfig::default(),
    };

    TestApp {
        router: app(state),
        hub,
        invoker,
    }
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn token(user_id: &str) -> String {
    JwtAuth::new(&auth_config())
        .unwrap()
        .issue(user_id, Duration::from_secs(3600))
        .unwrap()
}

fn membership(group_id: &str, user_id: &str) -> group_membership::Model {
    group_membership::Model {
        id: format!("m-{user_id}"),
        group_id: group_id.to_string(),
        user_id: user_id.to_string(),
        role: MemberRole::Member,
        joined_at: Utc::now().into(),
    }
}

fn content_row(id: &str, parent: Option<&str>) -> content::Model {
    content::Model {
        id: id.to_string(),
        content_type: "text".to_string(),
        data: format!("data of {id}"),
        group_id: "g1".to_string(),
        user_id: "u1".to_string(),
        parent_content_id: parent.map(String::from),
        metadata: None,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

fn get(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, user_id: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(get("/nonexistent/endpoint", "u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(Request::builder().uri("/groups").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/groups")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_content_returns_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<content::Model>::new()])
        .into_connection();
    let app = create_test_app(db);

    let response = app.router.oneshot(get("/content/missing", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CONTENT_NOT_FOUND");
}

#[tokio::test]
async fn test_listing_requires_membership() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<group_membership::Model>::new()])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .router
        .oneshot(get("/content?groupId=g1", "outsider"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_root_then_list_roots() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // POST /content
        .append_query_results([[membership("g1", "u1")]])
        .append_query_results([[content_row("c1", None)]])
        // GET /content?groupId=g1
        .append_query_results([[membership("g1", "u1")]])
        .append_query_results([[content_row("c1", None)]])
        .append_query_results([Vec::<content_tag::Model>::new()])
        .append_query_results([Vec::<content_tag::Model>::new()])
        .into_connection();
    let app = create_test_app(db);
    let mut events = app.hub.subscribe(&Topic::content("g1"));

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/content",
            "u1",
            &json!({ "type": "text", "data": "data of c1", "groupId": "g1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["data"]["id"], "c1");
    assert_eq!(created["data"]["childCount"], 0);

    match events.try_recv().unwrap() {
        RealtimeEvent::ContentInserted { content } => assert_eq!(content.id, "c1"),
        other => panic!("unexpected event: {other:?}"),
    }

    let response = app
        .router
        .oneshot(get("/content?groupId=g1&limit=10", "u1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let ids: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c1"]);
}

#[tokio::test]
async fn test_create_rejects_empty_type() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[membership("g1", "u1")]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .router
        .oneshot(post_json(
            "/content",
            "u1",
            &json!({ "type": "", "data": "x", "groupId": "g1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(get("/content/search?groupId=g1&q=%20", "u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn job_row(id: &str, user_id: &str) -> content_processing_job::Model {
    content_processing_job::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        group_id: None,
        content_id: None,
        job_type: "seo-extract".to_string(),
        status: JobStatus::Pending,
        progress: 0,
        payload: json!({}),
        result: None,
        error: None,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
        completed_at: None,
    }
}

#[tokio::test]
async fn test_other_users_job_is_hidden() {
    let job = job_row("j1", "u2");
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[job]])
        .into_connection();
    let app = create_test_app(db);

    let response = app.router.oneshot(get("/jobs/j1", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lambda_invoke_adds_caller() {
    let app = create_test_app(empty_db());

    let response = app
        .router
        .oneshot(post_json(
            "/lambda/invoke",
            "u1",
            &json!({ "action": "seo-extract", "payload": { "url": "https://example.com" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["success"], true);

    let requests = app.invoker.requests.lock().unwrap();
    assert_eq!(requests[0].action, "seo-extract");
    assert_eq!(requests[0].payload["userId"], "u1");
}

#[tokio::test]
async fn test_sse_jobs_returns_stream() {
    let app = create_test_app(empty_db());

    let response = app.router.oneshot(get("/realtime/jobs", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    assert!(content_type.unwrap().contains("text/event-stream"));
    assert_eq!(app.hub.subscriber_count(&Topic::jobs("u1")), 1);
}

#[tokio::test]
async fn test_worker_job_change_reaches_jobs_stream() {
    let app = create_test_app(empty_db());
    let response = app.router.oneshot(get("/realtime/jobs", "u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut job = job_row("j1", "u1");
    job.status = JobStatus::Processing;
    job.progress = 60;
    let worker_db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[job]])
            .into_connection(),
    );
    let mut watcher = JobWatcher::new(JobRepository::new(worker_db), app.hub.clone());
    assert_eq!(watcher.poll().await.unwrap(), 1);

    let mut body = response.into_body().into_data_stream();
    let frames = tokio::time::timeout(Duration::from_secs(5), async {
        let mut seen = String::new();
        while let Some(chunk) = body.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains("jobUpdated") {
                break;
            }
        }
        seen
    })
    .await
    .unwrap();

    assert!(frames.contains("event: jobUpdated"));
    assert!(frames.contains("\"j1\""));
}

#[tokio::test]
async fn test_sse_content_requires_membership() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<group_membership::Model>::new()])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .router
        .oneshot(get("/realtime/content/g1", "outsider"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
