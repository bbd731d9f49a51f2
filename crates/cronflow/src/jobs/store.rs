use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::model::{Job, JobType, NewRecurringJob, RecurringJob};

/// What the queue needs from persistent storage.
///
/// Mutual exclusion between workers lives entirely behind
/// `claim_next_pending`: an implementation must guarantee that a job is
/// handed out at most once, and always the oldest pending job by
/// `(created_at, id)`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a `Pending` job. The store assigns `id` and `created_at`.
    async fn create_job(&self, job_type: &JobType, payload: &[u8]) -> anyhow::Result<Job>;

    /// Atomically takes the oldest `Pending` job and marks it `Processing`.
    /// `Ok(None)` means there was nothing to claim.
    async fn claim_next_pending(&self) -> anyhow::Result<Option<Job>>;

    /// Persists the job's current status.
    async fn save_job(&self, job: &Job) -> anyhow::Result<()>;

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>>;

    async fn create_recurring(&self, new: NewRecurringJob) -> anyhow::Result<RecurringJob>;

    /// Recurring definitions with `next_run_at <= now`.
    async fn due_recurring(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<RecurringJob>>;

    /// Persists the definition's `next_run_at`.
    async fn save_recurring(&self, job: &RecurringJob) -> anyhow::Result<()>;

    async fn get_recurring(&self, id: Uuid) -> anyhow::Result<Option<RecurringJob>>;
}
