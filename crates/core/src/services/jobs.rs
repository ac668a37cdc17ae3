//! Content processing jobs.
//!
//! Jobs are queued through the lambda router and their rows are written by
//! the workers. [`JobService`] reads them, waits on them, asks the workers to
//! cancel them and hands out realtime subscriptions for a user's jobs.
//! [`JobWatcher`] turns the workers' row writes into `jobs:{user_id}` events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use list_common::{AppError, AppResult};
use list_db::entities::content_processing_job::{self, JobStatus};
use list_db::repositories::JobRepository;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::{EventPublisherService, RealtimeEvent, Topic};
use crate::lambda::{InvokeResponse, LambdaService};

/// Default number of jobs returned by [`JobService::list`].
pub const DEFAULT_JOB_LIMIT: u64 = 50;

/// Rows read per query while [`JobWatcher`] catches up.
pub const WATCH_BATCH_SIZE: u64 = 200;

/// Job service for business logic.
#[derive(Clone)]
pub struct JobService {
    job_repo: JobRepository,
    lambda: LambdaService,
    events: EventPublisherService,
}

impl JobService {
    /// Create a new job service.
    #[must_use]
    pub const fn new(
        job_repo: JobRepository,
        lambda: LambdaService,
        events: EventPublisherService,
    ) -> Self {
        Self {
            job_repo,
            lambda,
            events,
        }
    }

    /// A job owned by `user_id`.
    pub async fn get(&self, user_id: &str, id: &str) -> AppResult<content_processing_job::Model> {
        self.job_repo
            .find_by_id(id)
            .await?
            .filter(|job| job.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))
    }

    /// A user's jobs, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: Option<u64>,
    ) -> AppResult<Vec<content_processing_job::Model>> {
        let limit = limit.unwrap_or(DEFAULT_JOB_LIMIT).clamp(1, 200);
        self.job_repo.list_for_user(user_id, status, limit).await
    }

    /// Poll a job until it reaches a terminal status.
    ///
    /// Errors from the lookup end the wait as they are; nothing is retried.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> AppResult<content_processing_job::Model> {
        let poll = async {
            loop {
                let job = self
                    .job_repo
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

                if job.status.is_terminal() {
                    return Ok::<_, AppError>(job);
                }

                debug!(job_id = id, status = ?job.status, progress = job.progress, "Waiting for job");
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            AppError::ExternalService(format!(
                "Timed out after {}s waiting for job {id}",
                timeout.as_secs()
            ))
        })?
    }

    /// Ask the workers to cancel a job. The row is left for the worker to update.
    pub async fn cancel(&self, user_id: &str, id: &str) -> AppResult<InvokeResponse> {
        let job = self.get(user_id, id).await?;
        if job.status.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "Job already finished: {id}"
            )));
        }

        self.lambda.cancel_job(id).await
    }

    /// Realtime updates for a user's jobs.
    #[must_use]
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe(&Topic::jobs(user_id))
    }
}

/// Publishes job rows changed by the workers to their owners' job topics.
///
/// The watcher keeps an `(updated_at, id)` cursor over
/// `content_processing_jobs` and starts at the time it was created, so only
/// changes made while it runs are relayed.
pub struct JobWatcher {
    job_repo: JobRepository,
    events: EventPublisherService,
    cursor: (DateTime<Utc>, String),
}

impl JobWatcher {
    /// Watch for job changes from now on.
    #[must_use]
    pub fn new(job_repo: JobRepository, events: EventPublisherService) -> Self {
        Self {
            job_repo,
            events,
            cursor: (Utc::now(), String::new()),
        }
    }

    /// Relay changes made after `since` instead.
    #[must_use]
    pub fn starting_at(mut self, since: DateTime<Utc>) -> Self {
        self.cursor = (since, String::new());
        self
    }

    /// Publish every change past the cursor and advance it.
    ///
    /// Returns the number of events published.
    pub async fn poll(&mut self) -> AppResult<usize> {
        let mut published = 0;

        loop {
            let batch = self
                .job_repo
                .changed_since((self.cursor.0, &self.cursor.1), WATCH_BATCH_SIZE)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            self.cursor = (last.updated_at.with_timezone(&Utc), last.id.clone());

            for job in &batch {
                if let Err(e) = self
                    .events
                    .publish_job_updated(&job.user_id, &job.id, job.status, job.progress)
                    .await
                {
                    warn!(error = %e, job_id = %job.id, "Failed to publish job update");
                    continue;
                }
                published += 1;
            }

            if (batch.len() as u64) < WATCH_BATCH_SIZE {
                break;
            }
        }

        Ok(published)
    }

    /// Poll every `period` until the task is aborted.
    #[must_use]
    pub fn spawn(mut self, period: Duration) -> JoinHandle<()> {
        info!(period = ?period, "Starting job watcher");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match self.poll().await {
                    Ok(0) => {}
                    Ok(count) => debug!(count, "Published job updates"),
                    Err(e) => warn!(error = %e, "Failed to read job changes"),
                }
            }
        })
    }
}
