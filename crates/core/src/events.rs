//! Realtime events.
//!
//! Services publish through [`EventPublisher`] after a write has been
//! committed. Subscribers listen on a [`Topic`]: `content:{groupId}` for
//! changes inside a group and `jobs:{userId}` for a user's processing jobs.
//! The in-process hub and the Redis fan-out live in `list-realtime`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use list_common::{AppError, AppResult};
use list_db::entities::content;
use list_db::entities::content_processing_job::JobStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Content changes inside one group.
    Content(String),
    /// Job updates for one user.
    Jobs(String),
}

impl Topic {
    /// Topic for a group's content.
    pub fn content(group_id: impl Into<String>) -> Self {
        Self::Content(group_id.into())
    }

    /// Topic for a user's jobs.
    pub fn jobs(user_id: impl Into<String>) -> Self {
        Self::Jobs(user_id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(group_id) => write!(f, "content:{group_id}"),
            Self::Jobs(user_id) => write!(f, "jobs:{user_id}"),
        }
    }
}

impl FromStr for Topic {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("content", id)) if !id.is_empty() => Ok(Self::content(id)),
            Some(("jobs", id)) if !id.is_empty() => Ok(Self::jobs(id)),
            _ => Err(AppError::BadRequest(format!("Unknown topic: {s}"))),
        }
    }
}

/// Event delivered to topic subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RealtimeEvent {
    /// A content row was inserted.
    ContentInserted { content: content::Model },
    /// A content row was updated.
    ContentUpdated { content: content::Model },
    /// A content row was deleted.
    #[serde(rename_all = "camelCase")]
    ContentDeleted { id: String, group_id: String },
    /// A job changed status or progress.
    JobUpdated {
        id: String,
        status: JobStatus,
        progress: i32,
    },
}

impl RealtimeEvent {
    /// Short name used for SSE event names and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContentInserted { .. } => "contentInserted",
            Self::ContentUpdated { .. } => "contentUpdated",
            Self::ContentDeleted { .. } => "contentDeleted",
            Self::JobUpdated { .. } => "jobUpdated",
        }
    }
}

/// Publisher for realtime events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a raw event on a topic.
    async fn publish(&self, topic: &Topic, event: RealtimeEvent) -> AppResult<()>;

    /// Subscribe to a topic.
    ///
    /// Publishers without local delivery hand out a receiver whose sender
    /// is already gone, so it yields `Closed` immediately.
    fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<RealtimeEvent>;

    /// Publish a content inserted event to the content's group.
    async fn publish_content_inserted(&self, content: &content::Model) -> AppResult<()> {
        self.publish(
            &Topic::content(&content.group_id),
            RealtimeEvent::ContentInserted {
                content: content.clone(),
            },
        )
        .await
    }

    /// Publish a content updated event to the content's group.
    async fn publish_content_updated(&self, content: &content::Model) -> AppResult<()> {
        self.publish(
            &Topic::content(&content.group_id),
            RealtimeEvent::ContentUpdated {
                content: content.clone(),
            },
        )
        .await
    }

    /// Publish a content deleted event.
    async fn publish_content_deleted(&self, id: &str, group_id: &str) -> AppResult<()> {
        self.publish(
            &Topic::content(group_id),
            RealtimeEvent::ContentDeleted {
                id: id.to_string(),
                group_id: group_id.to_string(),
            },
        )
        .await
    }

    /// Publish a job update to its owner.
    async fn publish_job_updated(
        &self,
        user_id: &str,
        id: &str,
        status: JobStatus,
        progress: i32,
    ) -> AppResult<()> {
        self.publish(
            &Topic::jobs(user_id),
            RealtimeEvent::JobUpdated {
                id: id.to_string(),
                status,
                progress,
            },
        )
        .await
    }
}

/// A no-op implementation of `EventPublisher` for tests or when realtime is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _topic: &Topic, _event: RealtimeEvent) -> AppResult<()> {
        Ok(())
    }

    fn subscribe(&self, _topic: &Topic) -> broadcast::Receiver<RealtimeEvent> {
        broadcast::channel(1).1
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
