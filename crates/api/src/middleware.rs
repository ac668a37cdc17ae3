//! Application state and request middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use list_common::config::ListingConfig;
use list_core::{
    ContentService, EventPublisherService, GroupService, JobService, LambdaService, TagService,
};

use crate::auth::JwtAuth;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub content_service: ContentService,
    pub tag_service: TagService,
    pub group_service: GroupService,
    pub job_service: JobService,
    pub lambda_service: LambdaService,
    pub events: EventPublisherService,
    pub auth: JwtAuth,
    pub listing: ListingConfig,
}

/// Authentication middleware.
///
/// Puts the caller into the request extensions when the request carries a
/// valid bearer token, or when anonymous access is enabled. A token that
/// fails verification ends the request with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.auth.authenticate(header) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => return e.into_response(),
    }

    next.run(req).await
}
