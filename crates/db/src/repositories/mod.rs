//! Repositories.

pub mod content;
pub mod group;
pub mod invite;
pub mod job;
pub mod tag;

pub use content::{ContentPatch, ContentRepository, ContentWithMeta, NewContent};
pub use group::GroupRepository;
pub use invite::{InviteGraph, InviteRepository, InviteStats, JoinGroupResult};
pub use job::{JobRepository, NewJob};
pub use tag::TagRepository;
