//! Content processing job repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use list_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value;

use crate::entities::content_processing_job::{self, JobStatus};
use crate::entities::ContentProcessingJob;

/// Input for [`JobRepository::create`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub group_id: Option<String>,
    pub content_id: Option<String>,
    pub job_type: String,
    pub payload: Value,
}

/// Repository for content processing jobs.
#[derive(Clone)]
pub struct JobRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl JobRepository {
    /// Create a new job repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record a pending job.
    pub async fn create(&self, input: NewJob) -> AppResult<content_processing_job::Model> {
        let now = Utc::now();
        let model = content_processing_job::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(input.user_id),
            group_id: Set(input.group_id),
            content_id: Set(input.content_id),
            job_type: Set(input.job_type),
            status: Set(JobStatus::Pending),
            progress: Set(0),
            payload: Set(input.payload),
            result: Set(None),
            error: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            completed_at: Set(None),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<content_processing_job::Model>> {
        ContentProcessingJob::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's jobs, newest first, optionally narrowed to one status.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: u64,
    ) -> AppResult<Vec<content_processing_job::Model>> {
        let mut query = ContentProcessingJob::find()
            .filter(content_processing_job::Column::UserId.eq(user_id));

        if let Some(status) = status {
            query = query.filter(content_processing_job::Column::Status.eq(status));
        }

        query
            .order_by_desc(content_processing_job::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Jobs written after the `(updated_at, id)` position `after`, oldest first.
    ///
    /// Pass the last returned row's position back in to page through changes
    /// without skipping rows that share a timestamp.
    pub async fn changed_since(
        &self,
        after: (DateTime<Utc>, &str),
        limit: u64,
    ) -> AppResult<Vec<content_processing_job::Model>> {
        let (updated_at, id) = after;
        ContentProcessingJob::find()
            .filter(
                Condition::any()
                    .add(content_processing_job::Column::UpdatedAt.gt(updated_at))
                    .add(
                        Condition::all()
                            .add(content_processing_job::Column::UpdatedAt.eq(updated_at))
                            .add(content_processing_job::Column::Id.gt(id)),
                    ),
            )
            .order_by_asc(content_processing_job::Column::UpdatedAt)
            .order_by_asc(content_processing_job::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set status and progress. Progress is clamped to 0-100.
    pub async fn update_progress(
        &self,
        id: &str,
        status: JobStatus,
        progress: i32,
    ) -> AppResult<content_processing_job::Model> {
        let mut active = self.get_active(id).await?;
        active.status = Set(status);
        active.progress = Set(progress.clamp(0, 100));
        active.updated_at = Set(Utc::now().into());
        if status.is_terminal() {
            active.completed_at = Set(Some(Utc::now().into()));
        }

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a job completed with its result.
    pub async fn complete(
        &self,
        id: &str,
        result: Value,
    ) -> AppResult<content_processing_job::Model> {
        let now = Utc::now();
        let mut active = self.get_active(id).await?;
        active.status = Set(JobStatus::Completed);
        active.progress = Set(100);
        active.result = Set(Some(result));
        active.updated_at = Set(now.into());
        active.completed_at = Set(Some(now.into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a job failed with an error message.
    pub async fn fail(&self, id: &str, error: &str) -> AppResult<content_processing_job::Model> {
        let now = Utc::now();
        let mut active = self.get_active(id).await?;
        active.status = Set(JobStatus::Failed);
        active.error = Set(Some(error.to_string()));
        active.updated_at = Set(now.into());
        active.completed_at = Set(Some(now.into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_active(&self, id: &str) -> AppResult<content_processing_job::ActiveModel> {
        self.find_by_id(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))
    }
}
