use thiserror::Error;
use uuid::Uuid;

use crate::jobs::cron::CronError;
use crate::jobs::model::JobStatus;

/// Errors returned synchronously to producers and to callers that drive
/// the queue by hand. Dispatch failures never surface here; they end up as
/// a `Failed` job row.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("cron expression required")]
    EmptyCronExpr,

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("job {job_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
