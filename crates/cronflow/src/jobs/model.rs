use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::QueueError;

/// Identifies which registered handler runs a job.
///
/// The set is open: anything that is not a built-in type parses to
/// `Custom`, so a row written by a newer producer still loads and is failed
/// at dispatch time instead of at decode time.
///
/// Equality and hashing go through the stored name, so `Custom("print")`
/// and `Print` are the same type (and the same registry key).
#[derive(Debug, Clone)]
pub enum JobType {
    Print,
    Email,
    Custom(String),
}

impl JobType {
    pub fn as_str(&self) -> &str {
        match self {
            JobType::Print => "print",
            JobType::Email => "email",
            JobType::Custom(name) => name.as_str(),
        }
    }
}

impl PartialEq for JobType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for JobType {}

impl Hash for JobType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<&str> for JobType {
    fn from(s: &str) -> Self {
        match s {
            "print" => JobType::Print,
            "email" => JobType::Email,
            other => JobType::Custom(other.to_string()),
        }
    }
}

impl From<String> for JobType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "print" => JobType::Print,
            "email" => JobType::Email,
            _ => JobType::Custom(s),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and Failed are sinks.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("unknown job status {other:?}"),
        }
    }
}

/// One concrete unit of queued work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub payload: Vec<u8>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Moves the job along its lifecycle, refusing anything that would
    /// leave a terminal state or skip `Processing`.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// A template that spawns a [`Job`] every time its cron expression fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub payload: Vec<u8>,
    pub cron_expr: String,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringJob {
    pub job_type: JobType,
    pub payload: Vec<u8>,
    pub cron_expr: String,
    pub next_run_at: DateTime<Utc>,
}

/// Raw `jobs` row as stored; text columns are decoded into the typed model.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            job_type: JobType::from(row.job_type),
            payload: row.payload,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RecurringJobRow {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub cron_expr: String,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecurringJobRow> for RecurringJob {
    fn from(row: RecurringJobRow) -> Self {
        RecurringJob {
            id: row.id,
            job_type: JobType::from(row.job_type),
            payload: row.payload,
            cron_expr: row.cron_expr,
            next_run_at: row.next_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
