use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::model::{Job, JobStatus, JobType, NewRecurringJob, RecurringJob};
use crate::jobs::store::JobStore;

/// In-process [`JobStore`].
///
/// Rows live in insertion order, which is also `created_at` order, so the
/// first pending row is the FIFO head. A single lock around the rows plays
/// the role of the database's row lock during a claim.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: Vec<Job>,
    recurring: Vec<RecurringJob>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    /// Snapshot of every job, oldest first.
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().map(|g| g.jobs.clone()).unwrap_or_default()
    }

    /// Snapshot of every recurring definition, oldest first.
    pub fn recurring_jobs(&self) -> Vec<RecurringJob> {
        self.lock().map(|g| g.recurring.clone()).unwrap_or_default()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.lock()
            .map(|g| g.jobs.iter().filter(|j| j.status == status).count())
            .unwrap_or(0)
    }

    /// Inserts a recurring row verbatim, skipping cron validation.
    pub fn insert_recurring(&self, job: RecurringJob) -> anyhow::Result<()> {
        self.lock()?.recurring.push(job);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job_type: &JobType, payload: &[u8]) -> anyhow::Result<Job> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            job_type: job_type.clone(),
            payload: payload.to_vec(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.push(job.clone());
        Ok(job)
    }

    async fn claim_next_pending(&self) -> anyhow::Result<Option<Job>> {
        let mut inner = self.lock()?;
        let Some(job) = inner
            .jobs
            .iter_mut()
            .find(|j| j.status == JobStatus::Pending)
        else {
            return Ok(None);
        };
        job.transition(JobStatus::Processing)?;
        Ok(Some(job.clone()))
    }

    async fn save_job(&self, job: &Job) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let row = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| anyhow::anyhow!("job {} not found", job.id))?;
        row.status = job.status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>> {
        Ok(self.lock()?.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn create_recurring(&self, new: NewRecurringJob) -> anyhow::Result<RecurringJob> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let job = RecurringJob {
            id: Uuid::now_v7(),
            job_type: new.job_type,
            payload: new.payload,
            cron_expr: new.cron_expr,
            next_run_at: new.next_run_at,
            created_at: now,
            updated_at: now,
        };
        inner.recurring.push(job.clone());
        Ok(job)
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<RecurringJob>> {
        Ok(self
            .lock()?
            .recurring
            .iter()
            .filter(|r| r.next_run_at <= now)
            .cloned()
            .collect())
    }

    async fn save_recurring(&self, job: &RecurringJob) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let row = inner
            .recurring
            .iter_mut()
            .find(|r| r.id == job.id)
            .ok_or_else(|| anyhow::anyhow!("recurring job {} not found", job.id))?;
        row.next_run_at = job.next_run_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn get_recurring(&self, id: Uuid) -> anyhow::Result<Option<RecurringJob>> {
        Ok(self.lock()?.recurring.iter().find(|r| r.id == id).cloned())
    }
}
