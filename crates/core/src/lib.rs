//! Core business logic for list.
//!
//! Services sit between the HTTP surface and the repositories in
//! `list-db`. They validate input, talk to the lambda backend and publish
//! realtime events after successful writes.

pub mod events;
pub mod import;
pub mod invite_graph;
pub mod lambda;
pub mod services;

pub use events::{EventPublisher, EventPublisherService, NoOpEventPublisher, RealtimeEvent, Topic};
pub use lambda::{LambdaClient, LambdaInvoker, LambdaService};
pub use services::*;
