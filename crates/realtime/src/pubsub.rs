//! Redis Pub/Sub relay for cross-instance delivery.
//!
//! Every topic maps to the channel `{prefix}:{topic}`. Publishing only
//! writes to Redis; the pattern subscription started by
//! [`RedisPubSub::start`] brings each message back, including our own, and
//! hands it to the local [`RealtimeHub`].

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use list_common::{AppError, AppResult};
use list_core::{EventPublisher, RealtimeEvent, Topic};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::hub::RealtimeHub;

/// Redis channel carrying `topic`.
#[must_use]
pub fn channel_for(prefix: &str, topic: &Topic) -> String {
    format!("{prefix}:{topic}")
}

/// Topic carried by a Redis channel, if it is one of ours.
#[must_use]
pub fn topic_from_channel(prefix: &str, channel: &str) -> Option<Topic> {
    channel
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|topic| Topic::from_str(topic).ok())
}

fn redis_error(e: fred::error::Error) -> AppError {
    AppError::Redis(e.to_string())
}

/// Redis Pub/Sub relay in front of a [`RealtimeHub`].
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    hub: Arc<RealtimeHub>,
    prefix: String,
}

impl RedisPubSub {
    /// Connect both clients.
    pub async fn new(redis_url: &str, prefix: &str, hub: Arc<RealtimeHub>) -> AppResult<Self> {
        let config = RedisConfig::from_url(redis_url).map_err(redis_error)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await.map_err(redis_error)?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await.map_err(redis_error)?;

        info!(prefix, "Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            hub,
            prefix: prefix.to_string(),
        })
    }

    /// Subscribe to every topic channel and forward messages into the hub.
    pub async fn start(&self) -> AppResult<JoinHandle<()>> {
        let pattern = format!("{}:*", self.prefix);
        self.subscriber
            .psubscribe(pattern.as_str())
            .await
            .map_err(redis_error)?;
        info!(pattern, "Subscribed to Redis topic channels");

        let hub = Arc::clone(&self.hub);
        let prefix = self.prefix.clone();
        let mut messages = self.subscriber.message_rx();

        Ok(tokio::spawn(async move {
            loop {
                let message = match messages.recv().await {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Pub/Sub relay lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let channel: &str = &message.channel;
                let Some(topic) = topic_from_channel(&prefix, channel) else {
                    debug!(channel, "Ignoring message on unknown channel");
                    continue;
                };
                let Some(payload) = message.value.as_string() else {
                    warn!(channel, "Pub/Sub message without a text payload");
                    continue;
                };

                match serde_json::from_str::<RealtimeEvent>(&payload) {
                    Ok(event) => {
                        let delivered = hub.deliver(&topic, event);
                        debug!(%topic, delivered, "Relayed Pub/Sub event");
                    }
                    Err(e) => warn!(channel, error = %e, "Failed to parse Pub/Sub message"),
                }
            }
            info!("Pub/Sub message stream ended");
        }))
    }

    /// Close both connections.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.subscriber.quit().await.map_err(redis_error)?;
        self.publisher.quit().await.map_err(redis_error)?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish(&self, topic: &Topic, event: RealtimeEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;
        let channel = channel_for(&self.prefix, topic);
        let _: () = self
            .publisher
            .publish(channel.as_str(), payload)
            .await
            .map_err(redis_error)?;
        debug!(channel, event = event.name(), "Published Pub/Sub event");
        Ok(())
    }

    fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<RealtimeEvent> {
        self.hub.subscribe(topic)
    }
}
