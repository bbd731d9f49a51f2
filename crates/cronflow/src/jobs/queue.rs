use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::jobs::cron;
use crate::jobs::model::{Job, JobType, NewRecurringJob, RecurringJob};
use crate::jobs::notifier::Notifier;
use crate::jobs::payloads::EmailPayload;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::store::JobStore;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub num_workers: usize,
    /// How long an idle worker waits for a wake-up before polling anyway.
    pub poll_interval: Duration,
    /// Recurring scheduler tick.
    pub recurring_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            poll_interval: Duration::from_millis(100),
            recurring_interval: Duration::from_secs(60),
        }
    }
}

/// Handle to the job queue.
///
/// Cheap to clone; construct one at startup and pass it to whatever needs
/// to enqueue work. Clones share the store, the registry and the wake-up
/// channel.
#[derive(Clone)]
pub struct JobQueue {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) notifier: Notifier,
    pub(crate) cfg: QueueConfig,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, registry: HandlerRegistry, cfg: QueueConfig) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            notifier: Notifier::new(cfg.num_workers),
            cfg,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn config(&self) -> &QueueConfig {
        &self.cfg
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    /// Creates a pending job and wakes one idle worker.
    pub async fn add_job(&self, job_type: JobType, payload: impl AsRef<[u8]>) -> Result<Uuid> {
        let job = self.store.create_job(&job_type, payload.as_ref()).await?;
        self.notifier.notify();
        Ok(job.id)
    }

    /// Serializes `payload` as JSON and enqueues it.
    pub async fn add_json_job<T: Serialize>(&self, job_type: JobType, payload: &T) -> Result<Uuid> {
        let bytes = serde_json::to_vec(payload)?;
        self.add_job(job_type, bytes).await
    }

    /// Enqueues an `email` job.
    pub async fn send_email(
        &self,
        subject: &str,
        body: &str,
        sender: &str,
        recipients: &[String],
    ) -> Result<Uuid> {
        let payload = EmailPayload {
            subject: subject.to_string(),
            body: body.to_string(),
            sender: sender.to_string(),
            to: recipients.to_vec(),
        };
        self.add_json_job(JobType::Email, &payload).await
    }

    /// Registers a definition that enqueues `job_type` with `payload` every
    /// time `cron_expr` fires. The first run is the next match after now.
    pub async fn add_recurring_job(
        &self,
        job_type: JobType,
        payload: impl AsRef<[u8]>,
        cron_expr: &str,
    ) -> Result<RecurringJob> {
        if cron_expr.trim().is_empty() {
            return Err(QueueError::EmptyCronExpr);
        }
        let next_run_at = cron::next_fire_time(cron_expr, Utc::now())?;

        let rj = self
            .store
            .create_recurring(NewRecurringJob {
                job_type,
                payload: payload.as_ref().to_vec(),
                cron_expr: cron_expr.to_string(),
                next_run_at,
            })
            .await?;

        info!(recurring_id = %rj.id, job_type = %rj.job_type, cron = %rj.cron_expr, next_run_at = %rj.next_run_at, "recurring job added");
        Ok(rj)
    }

    // ----------------------------
    // Lifecycle
    // ----------------------------

    /// Spawns the worker pool and the recurring scheduler.
    ///
    /// Must be called from within a tokio runtime. Workers run until
    /// [`RunningQueue::shutdown`] is called or the returned handle is
    /// dropped. Each call gets its own stop signal, so a queue can be
    /// started again after a shutdown.
    pub fn start(&self) -> RunningQueue {
        let (shutdown, stop) = watch::channel(false);
        let mut handles = Vec::with_capacity(self.cfg.num_workers + 1);

        for worker_id in 0..self.cfg.num_workers {
            let queue = self.clone();
            let stop = stop.clone();
            handles.push(tokio::spawn(async move {
                queue.run_worker(worker_id, stop).await;
            }));
        }

        let queue = self.clone();
        handles.push(tokio::spawn(async move {
            queue.run_recurring_scheduler(stop).await;
        }));

        info!(
            num_workers = self.cfg.num_workers,
            poll_interval_ms = self.cfg.poll_interval.as_millis() as u64,
            recurring_interval_secs = self.cfg.recurring_interval.as_secs(),
            "job queue started"
        );

        RunningQueue { handles, shutdown }
    }

    /// Fetch-and-lock one pending job.
    pub async fn fetch_job(&self) -> anyhow::Result<Option<Job>> {
        self.store.claim_next_pending().await
    }
}

/// Background tasks spawned by [`JobQueue::start`].
#[must_use = "dropping a RunningQueue stops its workers"]
pub struct RunningQueue {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl RunningQueue {
    /// Asks every task to stop and waits for them.
    ///
    /// Workers notice the signal between jobs; a handler that is running
    /// finishes first.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "queue task ended abnormally");
            }
        }
        info!("job queue stopped");
    }
}
