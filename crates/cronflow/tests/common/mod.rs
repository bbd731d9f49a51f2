#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cronflow::jobs::{
    HandlerRegistry, Job, JobQueue, JobStore, JobType, MemoryStore, NewRecurringJob, QueueConfig,
    RecurringJob,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

/// Connects to `TEST_DATABASE_URL`, migrates and truncates.
///
/// Returns `None` when the variable is unset so database tests are skipped
/// on machines without Postgres.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    cronflow::db::run_migrations(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE jobs, recurring_jobs")
        .execute(&pool)
        .await
        .expect("truncate failed");

    Some(pool)
}

pub fn test_config(num_workers: usize) -> QueueConfig {
    QueueConfig {
        num_workers,
        poll_interval: Duration::from_millis(20),
        recurring_interval: Duration::from_secs(60),
    }
}

pub fn memory_queue(
    num_workers: usize,
    registry: HandlerRegistry,
) -> (JobQueue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let queue = JobQueue::new(store.clone(), registry, test_config(num_workers));
    (queue, store)
}

/// Polls `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// [`MemoryStore`] wrapper whose operations can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_create: AtomicBool,
    pub fail_claim: AtomicBool,
    pub fail_save: AtomicBool,
    pub fail_save_recurring: AtomicBool,
}

impl FlakyStore {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> anyhow::Result<()> {
        if flag.load(Ordering::SeqCst) {
            anyhow::bail!("injected {what} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create_job(&self, job_type: &JobType, payload: &[u8]) -> anyhow::Result<Job> {
        Self::check(&self.fail_create, "create")?;
        self.inner.create_job(job_type, payload).await
    }

    async fn claim_next_pending(&self) -> anyhow::Result<Option<Job>> {
        Self::check(&self.fail_claim, "claim")?;
        self.inner.claim_next_pending().await
    }

    async fn save_job(&self, job: &Job) -> anyhow::Result<()> {
        Self::check(&self.fail_save, "save")?;
        self.inner.save_job(job).await
    }

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn create_recurring(&self, new: NewRecurringJob) -> anyhow::Result<RecurringJob> {
        self.inner.create_recurring(new).await
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<RecurringJob>> {
        self.inner.due_recurring(now).await
    }

    async fn save_recurring(&self, job: &RecurringJob) -> anyhow::Result<()> {
        Self::check(&self.fail_save_recurring, "save recurring")?;
        self.inner.save_recurring(job).await
    }

    async fn get_recurring(&self, id: Uuid) -> anyhow::Result<Option<RecurringJob>> {
        self.inner.get_recurring(id).await
    }
}
