// crates/cronflow/src/jobs/repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::jobs::model::{
    Job, JobRow, JobStatus, JobType, NewRecurringJob, RecurringJob, RecurringJobRow,
};
use crate::jobs::store::JobStore;

/// Postgres-backed [`JobStore`].
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ----------------------------
    // Operator views (cronflowctl)
    // ----------------------------

    /// Job counts per status, in lifecycle order. Statuses with no rows
    /// are reported as zero.
    pub async fn status_counts(&self) -> anyhow::Result<Vec<(JobStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let statuses = [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        Ok(statuses
            .into_iter()
            .map(|s| {
                let n = rows
                    .iter()
                    .find(|(name, _)| name == s.as_str())
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                (s, n)
            })
            .collect())
    }

    /// Most recent jobs first; `limit` is clamped to [1, 500].
    pub async fn list_jobs(&self, limit: i64) -> anyhow::Result<Vec<Job>> {
        let limit = limit.clamp(1, 500);
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, payload, status, created_at, updated_at
            FROM jobs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn list_recurring(&self) -> anyhow::Result<Vec<RecurringJob>> {
        let rows = sqlx::query_as::<_, RecurringJobRow>(
            r#"
            SELECT id, job_type, payload, cron_expr, next_run_at, created_at, updated_at
            FROM recurring_jobs
            ORDER BY next_run_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecurringJob::from).collect())
    }

    /// Removes every job and recurring definition.
    pub async fn reset(&self) -> anyhow::Result<()> {
        sqlx::query("TRUNCATE TABLE jobs, recurring_jobs")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for JobsRepo {
    async fn create_job(&self, job_type: &JobType, payload: &[u8]) -> anyhow::Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, job_type, payload, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, job_type, payload, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(job_type.as_str())
        .bind(payload)
        .bind(JobStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Job::try_from(row)
    }

    /// Claim exactly one pending job for the calling worker.
    ///
    /// Correctness: SELECT ... FOR UPDATE SKIP LOCKED inside one
    /// transaction. A concurrent claimer skips the locked head row and takes
    /// the next one, and once this commits the row is no longer `pending`.
    async fn claim_next_pending(&self) -> anyhow::Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            WITH candidate AS (
              SELECT id
              FROM jobs
              WHERE status = 'pending'
              ORDER BY created_at ASC, id ASC
              FOR UPDATE SKIP LOCKED
              LIMIT 1
            )
            UPDATE jobs j
            SET status = 'processing',
                updated_at = now()
            FROM candidate
            WHERE j.id = candidate.id
            RETURNING j.id, j.job_type, j.payload, j.status, j.created_at, j.updated_at
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        row.map(Job::try_from).transpose()
    }

    async fn save_job(&self, job: &Job) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            anyhow::bail!("job {} not found", job.id);
        }
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, job_type, payload, status, created_at, updated_at FROM jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn create_recurring(&self, new: NewRecurringJob) -> anyhow::Result<RecurringJob> {
        let row = sqlx::query_as::<_, RecurringJobRow>(
            r#"
            INSERT INTO recurring_jobs (id, job_type, payload, cron_expr, next_run_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, job_type, payload, cron_expr, next_run_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(new.job_type.as_str())
        .bind(&new.payload)
        .bind(&new.cron_expr)
        .bind(new.next_run_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<RecurringJob>> {
        let rows = sqlx::query_as::<_, RecurringJobRow>(
            r#"
            SELECT id, job_type, payload, cron_expr, next_run_at, created_at, updated_at
            FROM recurring_jobs
            WHERE next_run_at <= $1
            ORDER BY next_run_at ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecurringJob::from).collect())
    }

    async fn save_recurring(&self, job: &RecurringJob) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE recurring_jobs
            SET next_run_at = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.next_run_at)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            anyhow::bail!("recurring job {} not found", job.id);
        }
        Ok(())
    }

    async fn get_recurring(&self, id: Uuid) -> anyhow::Result<Option<RecurringJob>> {
        let row = sqlx::query_as::<_, RecurringJobRow>(
            r#"
            SELECT id, job_type, payload, cron_expr, next_run_at, created_at, updated_at
            FROM recurring_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RecurringJob::from))
    }
}
