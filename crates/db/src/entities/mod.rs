//! Database entities.

pub mod content;
pub mod content_processing_job;
pub mod content_relationship;
pub mod content_tag;
pub mod group;
pub mod group_invitation;
pub mod group_membership;
pub mod tag;
pub mod user_invite_code;

pub use content::Entity as Content;
pub use content_processing_job::Entity as ContentProcessingJob;
pub use content_relationship::Entity as ContentRelationship;
pub use content_tag::Entity as ContentTag;
pub use group::Entity as Group;
pub use group_invitation::Entity as GroupInvitation;
pub use group_membership::Entity as GroupMembership;
pub use tag::Entity as Tag;
pub use user_invite_code::Entity as UserInviteCode;
