use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::jobs::model::{Job, JobStatus};
use crate::jobs::queue::JobQueue;
use crate::jobs::registry::{HandlerEntry, JobError};

impl JobQueue {
    /// Worker loop: drain pending jobs greedily, then wait for a wake-up or
    /// the poll timeout. Fetch and save errors, and panicking handlers, are
    /// logged and never end the loop; only the shutdown signal does.
    pub(crate) async fn run_worker(self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.fetch_job().await {
                Ok(Some(job)) => {
                    self.process_job(worker_id, job).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!(worker_id, error = %e, "worker fetch error"),
            }

            tokio::select! {
                _ = self.notifier.wait(self.cfg.poll_interval) => {}
                changed = shutdown.changed() => {
                    // sender gone: the RunningQueue was dropped
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker_id, "worker stopping");
    }

    /// Runs the handler for a claimed job and records the terminal status.
    ///
    /// Only `Processing` jobs (as returned by [`JobQueue::fetch_job`]) are
    /// dispatched; anything else is returned untouched without running a
    /// handler. Returns the status that was recorded (or attempted, when
    /// the save itself failed).
    pub async fn process_job(&self, worker_id: usize, mut job: Job) -> JobStatus {
        if job.status != JobStatus::Processing {
            warn!(worker_id, job_id = %job.id, status = %job.status, "job not claimed, skipping dispatch");
            return job.status;
        }

        info!(worker_id, job_id = %job.id, job_type = %job.job_type, "processing job");

        let outcome = match self.registry.handler_for(&job.job_type) {
            None => {
                error!(worker_id, job_id = %job.id, job_type = %job.job_type, "no registered job handler");
                JobStatus::Failed
            }
            Some(entry) => match dispatch(entry, &job.payload).await {
                Ok(()) => JobStatus::Completed,
                Err(err) => {
                    error!(
                        worker_id,
                        job_id = %job.id,
                        job_type = %job.job_type,
                        code = err.code,
                        error = %err.message,
                        "job failed"
                    );
                    JobStatus::Failed
                }
            },
        };

        if let Err(e) = job.transition(outcome) {
            warn!(worker_id, error = %e, "refusing to record job status");
            return job.status;
        }

        if let Err(e) = self.store.save_job(&job).await {
            error!(worker_id, job_id = %job.id, error = %e, "failed to update job");
        }
        outcome
    }
}

/// Runs a handler, turning a panic into a `PANIC` job error so the worker
/// task survives it.
async fn dispatch(entry: &HandlerEntry, payload: &[u8]) -> Result<(), JobError> {
    match AssertUnwindSafe(entry.run(payload)).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(JobError::new("PANIC", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
