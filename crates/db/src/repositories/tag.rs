//! Tag repository.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use list_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};

use crate::entities::{ContentTag, Tag, content_tag, tag};

/// Repository for tags and the content-tag join table.
#[derive(Clone)]
pub struct TagRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl TagRepository {
    /// Create a new tag repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Tag Operations ====================

    /// Find a tag by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<tag::Model>> {
        Tag::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All tags owned by a user, by name.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<tag::Model>> {
        Tag::find()
            .filter(tag::Column::UserId.eq(user_id))
            .order_by_asc(tag::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's tag by exact name.
    pub async fn find_by_name(&self, user_id: &str, name: &str) -> AppResult<Option<tag::Model>> {
        Tag::find()
            .filter(tag::Column::UserId.eq(user_id))
            .filter(tag::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a tag.
    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        color: Option<String>,
    ) -> AppResult<tag::Model> {
        let model = tag::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            name: Set(name.to_string()),
            color: Set(color),
            created_at: Set(Utc::now().into()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Return the user's tag called `name`, creating it if needed.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        name: &str,
        color: Option<String>,
    ) -> AppResult<tag::Model> {
        if let Some(existing) = self.find_by_name(user_id, name).await? {
            return Ok(existing);
        }
        self.create(user_id, name, color).await
    }

    /// Rename and/or recolor a tag.
    pub async fn update(
        &self,
        id: &str,
        name: Option<String>,
        color: Option<String>,
    ) -> AppResult<tag::Model> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag not found: {id}")))?;

        let mut active: tag::ActiveModel = existing.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if color.is_some() {
            active.color = Set(color);
        }

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a tag. Its content links cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Tag::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ==================== Content Tag Operations ====================

    /// Attach a tag to content. Attaching an existing pair is a no-op.
    pub async fn add_tag_to_content(&self, content_id: &str, tag_id: &str) -> AppResult<()> {
        let model = content_tag::ActiveModel {
            content_id: Set(content_id.to_string()),
            tag_id: Set(tag_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        ContentTag::insert(model)
            .on_conflict(
                OnConflict::columns([content_tag::Column::ContentId, content_tag::Column::TagId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Detach a tag from content.
    pub async fn remove_tag_from_content(&self, content_id: &str, tag_id: &str) -> AppResult<()> {
        ContentTag::delete_many()
            .filter(content_tag::Column::ContentId.eq(content_id))
            .filter(content_tag::Column::TagId.eq(tag_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Tags attached to a single content item.
    pub async fn tags_for_content(&self, content_id: &str) -> AppResult<Vec<tag::Model>> {
        let mut map = self.tags_for_contents(&[content_id.to_string()]).await?;
        Ok(map.remove(content_id).unwrap_or_default())
    }

    /// Tags for many content items at once, keyed by content ID.
    ///
    /// Items without tags are absent from the map.
    pub async fn tags_for_contents(
        &self,
        content_ids: &[String],
    ) -> AppResult<HashMap<String, Vec<tag::Model>>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let links = ContentTag::find()
            .filter(content_tag::Column::ContentId.is_in(content_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if links.is_empty() {
            return Ok(HashMap::new());
        }

        let mut tag_ids: Vec<String> = links.iter().map(|l| l.tag_id.clone()).collect();
        tag_ids.sort_unstable();
        tag_ids.dedup();

        let tags: HashMap<String, tag::Model> = Tag::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut result: HashMap<String, Vec<tag::Model>> = HashMap::new();
        for link in links {
            if let Some(tag) = tags.get(&link.tag_id) {
                result.entry(link.content_id).or_default().push(tag.clone());
            }
        }
        for list in result.values_mut() {
            list.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(result)
    }

    /// IDs of content carrying every one of `tag_ids`.
    pub async fn content_ids_with_all_tags(&self, tag_ids: &[String]) -> AppResult<Vec<String>> {
        if tag_ids.is_empty() {
            return Ok(vec![]);
        }
        let required = i64::try_from(tag_ids.len()).unwrap_or(i64::MAX);

        ContentTag::find()
            .select_only()
            .column(content_tag::Column::ContentId)
            .filter(content_tag::Column::TagId.is_in(tag_ids.iter().cloned()))
            .group_by(content_tag::Column::ContentId)
            .having(Expr::cust_with_values(
                "COUNT(DISTINCT \"content_tags\".\"tag_id\") = $1",
                [required],
            ))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of content carrying at least one of `tag_ids`.
    pub async fn content_ids_with_any_tags(&self, tag_ids: &[String]) -> AppResult<Vec<String>> {
        if tag_ids.is_empty() {
            return Ok(vec![]);
        }

        ContentTag::find()
            .select_only()
            .column(content_tag::Column::ContentId)
            .filter(content_tag::Column::TagId.is_in(tag_ids.iter().cloned()))
            .distinct()
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
