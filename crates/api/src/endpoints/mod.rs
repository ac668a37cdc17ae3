//! API endpoints.

mod content;
mod groups;
mod invites;
mod jobs;
mod lambda;
mod tags;

use axum::{Router, routing::get};

use crate::middleware::AppState;
use crate::sse;

async fn health() -> &'static str {
    "ok"
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/content", content::router().merge(tags::content_router()))
        .nest("/tags", tags::router())
        .nest("/groups", groups::router())
        .nest("/invites", invites::router())
        .nest("/jobs", jobs::router())
        .nest("/lambda", lambda::router())
        .nest("/realtime", sse::router())
}
