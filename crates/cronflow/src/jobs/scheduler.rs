use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::jobs::cron;
use crate::jobs::queue::JobQueue;

impl JobQueue {
    /// Promotes due recurring definitions once per tick until shutdown.
    pub(crate) async fn run_recurring_scheduler(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.cfg.recurring_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("recurring scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_recurring_jobs(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    // sender gone: the RunningQueue was dropped
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("recurring scheduler stopping");
    }

    /// Enqueues every recurring definition due at or before `now` and moves
    /// its `next_run_at` to the next match after `now`.
    ///
    /// Missed firings are not replayed: a definition that was due several
    /// times while nothing was ticking fires once. Failures are isolated
    /// per row. Returns how many jobs were enqueued.
    pub async fn process_recurring_jobs(&self, now: DateTime<Utc>) -> usize {
        let due = match self.store.due_recurring(now).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "recurring scheduler query failed");
                return 0;
            }
        };

        let mut enqueued = 0;
        for mut rj in due {
            if let Err(e) = self.store.create_job(&rj.job_type, &rj.payload).await {
                error!(recurring_id = %rj.id, error = %e, "create job for recurring");
                continue;
            }
            enqueued += 1;
            self.notifier.notify();

            let next = match cron::next_fire_time(&rj.cron_expr, now) {
                Ok(next) => next,
                Err(e) => {
                    error!(recurring_id = %rj.id, cron = %rj.cron_expr, error = %e, "compute next run");
                    continue;
                }
            };

            rj.next_run_at = next;
            if let Err(e) = self.store.save_recurring(&rj).await {
                error!(recurring_id = %rj.id, error = %e, "update recurring job");
            }
        }
        enqueued
    }
}
