//! Tag service.

use list_common::{AppError, AppResult};
use list_db::entities::tag;
use list_db::repositories::TagRepository;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

/// Input for creating a tag.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub color: Option<String>,
}

/// Input for updating a tag.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagInput {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Outcome of a best-effort tag copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyTagsResult {
    pub copied: u32,
    pub failed: u32,
}

/// Tag service for business logic.
#[derive(Clone)]
pub struct TagService {
    tag_repo: TagRepository,
}

impl TagService {
    /// Create a new tag service.
    #[must_use]
    pub const fn new(tag_repo: TagRepository) -> Self {
        Self { tag_repo }
    }

    /// A user's tags, by name.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<tag::Model>> {
        self.tag_repo.find_by_user(user_id).await
    }

    /// Create a tag. Names are unique per user.
    pub async fn create(&self, user_id: &str, input: CreateTagInput) -> AppResult<tag::Model> {
        input.validate()?;
        let name = input.name.trim();
        validate_color(input.color.as_deref())?;

        if self.tag_repo.find_by_name(user_id, name).await?.is_some() {
            return Err(AppError::Conflict(format!("Tag already exists: {name}")));
        }

        self.tag_repo.create(user_id, name, input.color).await
    }

    /// Rename or recolor one of the user's tags.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        input: UpdateTagInput,
    ) -> AppResult<tag::Model> {
        input.validate()?;
        validate_color(input.color.as_deref())?;
        self.get_owned(user_id, id).await?;

        self.tag_repo
            .update(id, input.name.map(|n| n.trim().to_string()), input.color)
            .await
    }

    /// Delete one of the user's tags.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        self.get_owned(user_id, id).await?;
        self.tag_repo.delete(id).await
    }

    /// Attach a tag to content.
    pub async fn attach(&self, user_id: &str, content_id: &str, tag_id: &str) -> AppResult<()> {
        self.get_owned(user_id, tag_id).await?;
        self.tag_repo.add_tag_to_content(content_id, tag_id).await
    }

    /// Detach a tag from content.
    pub async fn detach(&self, content_id: &str, tag_id: &str) -> AppResult<()> {
        self.tag_repo
            .remove_tag_from_content(content_id, tag_id)
            .await
    }

    /// Tags on one item.
    pub async fn tags_for_content(&self, content_id: &str) -> AppResult<Vec<tag::Model>> {
        self.tag_repo.tags_for_content(content_id).await
    }

    /// Copy every tag of `from` onto `to`.
    ///
    /// Individual failures are logged and counted; the copy keeps going.
    pub async fn copy_tags(&self, from: &str, to: &str) -> AppResult<CopyTagsResult> {
        let tags = self.tag_repo.tags_for_content(from).await?;
        let mut result = CopyTagsResult::default();

        for tag in tags {
            match self.tag_repo.add_tag_to_content(to, &tag.id).await {
                Ok(()) => result.copied += 1,
                Err(e) => {
                    warn!(error = %e, tag_id = %tag.id, from, to, "Failed to copy tag");
                    result.failed += 1;
                }
            }
        }

        info!(from, to, copied = result.copied, failed = result.failed, "Tags copied");
        Ok(result)
    }

    async fn get_owned(&self, user_id: &str, id: &str) -> AppResult<tag::Model> {
        let tag = self
            .tag_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag not found: {id}")))?;

        if tag.user_id != user_id {
            return Err(AppError::Forbidden("Tag belongs to another user".to_string()));
        }
        Ok(tag)
    }
}

/// Accepts `#rgb` and `#rrggbb`.
fn validate_color(color: Option<&str>) -> AppResult<()> {
    let Some(color) = color else {
        return Ok(());
    };
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid color: {color}")))
    }
}
