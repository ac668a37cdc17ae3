//! Server-Sent Events for realtime topics.
//!
//! `GET /realtime/content/{groupId}` streams a group's content changes and
//! `GET /realtime/jobs` streams the caller's job updates. Each SSE event is
//! named after the [`RealtimeEvent`] variant and carries it as JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use list_common::AppResult;
use list_core::{RealtimeEvent, Topic};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use crate::{extractors::AuthUser, middleware::AppState};

const KEEP_ALIVE: Duration = Duration::from_secs(30);

fn to_sse_event(event: &RealtimeEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|_| Event::default().event("error").data("unserializable event"))
}

fn topic_stream(
    topic: Topic,
    rx: broadcast::Receiver<RealtimeEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let label = topic.to_string();
    let initial = stream::once(async move {
        Ok(Event::default().event("connected").data(label))
    });

    let events = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => Some(Ok(to_sse_event(&event))),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!(%topic, skipped = n, "SSE subscriber lagged");
            None
        }
    });

    Sse::new(initial.chain(events)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

/// Content changes in a group the caller belongs to.
async fn content_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.group_service.ensure_member(&group_id, &user.id).await?;

    let topic = Topic::content(&group_id);
    let rx = state.events.subscribe(&topic);
    debug!(user_id = %user.id, %topic, "SSE subscribed");
    Ok(topic_stream(topic, rx))
}

/// The caller's job updates.
async fn jobs_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.job_service.subscribe(&user.id);
    debug!(user_id = %user.id, "SSE subscribed to jobs");
    topic_stream(Topic::jobs(&user.id), rx)
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content/{group_id}", get(content_stream))
        .route("/jobs", get(jobs_stream))
}
