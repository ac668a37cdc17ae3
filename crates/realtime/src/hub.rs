//! In-process topic hub.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use list_common::AppResult;
use list_core::{EventPublisher, RealtimeEvent, Topic};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default per-topic buffer.
pub const DEFAULT_CAPACITY: usize = 256;

/// One broadcast channel per topic, created on first subscribe.
pub struct RealtimeHub {
    topics: RwLock<HashMap<Topic, broadcast::Sender<RealtimeEvent>>>,
    capacity: usize,
}

impl RealtimeHub {
    /// Create a hub with the default per-topic buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a hub whose topics buffer `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Deliver an event to this process's subscribers of `topic`.
    ///
    /// Returns how many receivers got it. Topics nobody listens to are not
    /// created.
    pub fn deliver(&self, topic: &Topic, event: RealtimeEvent) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = topics.get(topic) else {
            trace!(%topic, "No subscribers");
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    /// Drop channels that have no receivers left. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let before = topics.len();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        before - topics.len()
    }

    /// Number of live topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of subscribers on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Run [`Self::cleanup`] every `interval` until the hub is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let hub = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else { break };
                let removed = hub.cleanup();
                if removed > 0 {
                    debug!(removed, remaining = hub.topic_count(), "Cleaned up idle topics");
                }
            }
        })
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for RealtimeHub {
    async fn publish(&self, topic: &Topic, event: RealtimeEvent) -> AppResult<()> {
        let delivered = self.deliver(topic, event);
        trace!(%topic, delivered, "Published locally");
        Ok(())
    }

    fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<RealtimeEvent> {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}
