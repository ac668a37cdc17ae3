//! HTTP API layer for list.
//!
//! - **Endpoints**: content, tags, groups, invites, jobs and the lambda proxy
//! - **Auth**: HS256 bearer tokens resolved by [`middleware::auth_middleware`]
//! - **Realtime**: Server-Sent Events per topic
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod auth;
pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use auth::{CurrentUser, JwtAuth};
pub use endpoints::router;
pub use middleware::AppState;

/// Request bodies above this are rejected; content data itself is capped
/// at 1 MiB.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The full application: API routes plus auth, tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
