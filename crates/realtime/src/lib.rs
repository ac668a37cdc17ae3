//! Realtime fan-out for list.
//!
//! [`RealtimeHub`] keeps one broadcast channel per topic for the
//! subscribers connected to this process. [`RedisPubSub`] relays events
//! between instances: it publishes to Redis and feeds whatever it receives
//! back into the hub, so every instance delivers every event exactly once.

pub mod hub;
pub mod pubsub;

pub use hub::RealtimeHub;
pub use pubsub::RedisPubSub;
