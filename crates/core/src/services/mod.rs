//! Business logic services.

pub mod content;
pub mod group;
pub mod jobs;
pub mod tag;

pub use content::{CreateContentInput, ContentService, ListQuery};
pub use group::{CreateGroupInput, CreateInviteCodeInput, GroupService, JoinGroupInput};
pub use jobs::{JobService, JobWatcher};
pub use tag::{CopyTagsResult, CreateTagInput, TagService, UpdateTagInput};
