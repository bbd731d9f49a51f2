mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{memory_queue, test_config, wait_until, FlakyStore};
use cronflow::jobs::{
    HandlerRegistry, JobQueue, JobStatus, JobType, MemoryStore, QueueConfig, RecurringJob,
};
use uuid::Uuid;

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid rfc3339")
        .with_timezone(&Utc)
}

fn definition(cron: &str, next_run_at: DateTime<Utc>) -> RecurringJob {
    RecurringJob {
        id: Uuid::now_v7(),
        job_type: JobType::Print,
        payload: format!(r#"{{"message":"{cron}"}}"#).into_bytes(),
        cron_expr: cron.to_string(),
        next_run_at,
        created_at: next_run_at,
        updated_at: next_run_at,
    }
}

fn next_run(store: &MemoryStore, id: Uuid) -> DateTime<Utc> {
    store
        .recurring_jobs()
        .into_iter()
        .find(|r| r.id == id)
        .expect("recurring row")
        .next_run_at
}

#[tokio::test]
async fn due_definition_is_promoted_and_advanced() {
    let (queue, store) = memory_queue(2, HandlerRegistry::new());
    let now = at("2023-06-30T12:34:56Z");
    let rj = definition("*/5 * * * *", at("2023-06-30T12:30:00Z"));
    store.insert_recurring(rj.clone()).unwrap();

    assert_eq!(queue.process_recurring_jobs(now).await, 1);

    let jobs = store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, rj.job_type);
    assert_eq!(jobs[0].payload, rj.payload);
    assert_eq!(jobs[0].status, JobStatus::Pending);

    assert_eq!(next_run(&store, rj.id), at("2023-06-30T12:35:00Z"));
    assert_eq!(queue.notifier().pending(), 1);
}

#[tokio::test]
async fn repeated_tick_at_same_instant_does_not_double_enqueue() {
    let (queue, store) = memory_queue(2, HandlerRegistry::new());
    let now = at("2023-06-30T12:34:56Z");
    store
        .insert_recurring(definition("*/5 * * * *", at("2023-06-30T12:30:00Z")))
        .unwrap();

    assert_eq!(queue.process_recurring_jobs(now).await, 1);
    assert_eq!(queue.process_recurring_jobs(now).await, 0);
    assert_eq!(store.jobs().len(), 1);
}

#[tokio::test]
async fn definition_due_exactly_now_fires() {
    let (queue, store) = memory_queue(1, HandlerRegistry::new());
    let now = at("2023-06-30T12:35:00Z");
    let rj = definition("*/5 * * * *", now);
    store.insert_recurring(rj.clone()).unwrap();

    assert_eq!(queue.process_recurring_jobs(now).await, 1);
    assert_eq!(next_run(&store, rj.id), at("2023-06-30T12:40:00Z"));
}

#[tokio::test]
async fn future_definition_is_left_alone() {
    let (queue, store) = memory_queue(1, HandlerRegistry::new());
    let now = at("2023-06-30T12:34:56Z");
    let rj = definition("*/5 * * * *", at("2023-06-30T12:35:00Z"));
    store.insert_recurring(rj.clone()).unwrap();

    assert_eq!(queue.process_recurring_jobs(now).await, 0);
    assert!(store.jobs().is_empty());
    assert_eq!(next_run(&store, rj.id), rj.next_run_at);
    assert_eq!(queue.notifier().pending(), 0);
}

#[tokio::test]
async fn missed_firings_collapse_into_one() {
    let (queue, store) = memory_queue(1, HandlerRegistry::new());
    let now = at("2023-06-30T12:34:56Z");
    // every minute, last advanced three hours ago
    let rj = definition("* * * * *", at("2023-06-30T09:34:00Z"));
    store.insert_recurring(rj.clone()).unwrap();

    assert_eq!(queue.process_recurring_jobs(now).await, 1);
    assert_eq!(store.jobs().len(), 1);
    // anchored at now, not at the stale next_run_at
    assert_eq!(next_run(&store, rj.id), at("2023-06-30T12:35:00Z"));
}

#[tokio::test]
async fn broken_cron_row_does_not_block_others() {
    let (queue, store) = memory_queue(2, HandlerRegistry::new());
    let now = at("2023-06-30T12:34:56Z");
    let broken = definition("not a cron", at("2023-06-30T12:00:00Z"));
    let healthy = definition("0 * * * *", at("2023-06-30T12:00:00Z"));
    store.insert_recurring(broken.clone()).unwrap();
    store.insert_recurring(healthy.clone()).unwrap();

    // the broken row's job is created before its next run is computed
    assert_eq!(queue.process_recurring_jobs(now).await, 2);
    assert_eq!(store.jobs().len(), 2);

    assert_eq!(next_run(&store, broken.id), broken.next_run_at);
    assert_eq!(next_run(&store, healthy.id), at("2023-06-30T13:00:00Z"));
}

#[tokio::test]
async fn failed_create_leaves_definition_due() {
    let store = Arc::new(FlakyStore::default());
    let queue = JobQueue::new(store.clone(), HandlerRegistry::new(), test_config(1));
    let now = at("2023-06-30T12:34:56Z");
    let rj = definition("*/5 * * * *", at("2023-06-30T12:30:00Z"));
    store.inner.insert_recurring(rj.clone()).unwrap();

    FlakyStore::set(&store.fail_create, true);
    assert_eq!(queue.process_recurring_jobs(now).await, 0);
    assert_eq!(next_run(&store.inner, rj.id), rj.next_run_at);
    assert_eq!(queue.notifier().pending(), 0);

    FlakyStore::set(&store.fail_create, false);
    assert_eq!(queue.process_recurring_jobs(now).await, 1);
    assert_eq!(next_run(&store.inner, rj.id), at("2023-06-30T12:35:00Z"));
}

#[tokio::test]
async fn failed_advance_is_isolated_per_row() {
    let store = Arc::new(FlakyStore::default());
    let queue = JobQueue::new(store.clone(), HandlerRegistry::new(), test_config(2));
    let now = at("2023-06-30T12:34:56Z");
    let a = definition("*/5 * * * *", at("2023-06-30T12:30:00Z"));
    let b = definition("*/10 * * * *", at("2023-06-30T12:30:00Z"));
    store.inner.insert_recurring(a.clone()).unwrap();
    store.inner.insert_recurring(b.clone()).unwrap();

    FlakyStore::set(&store.fail_save_recurring, true);
    assert_eq!(queue.process_recurring_jobs(now).await, 2);
    assert_eq!(store.inner.jobs().len(), 2);
    assert_eq!(next_run(&store.inner, a.id), a.next_run_at);
    assert_eq!(next_run(&store.inner, b.id), b.next_run_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_queue_promotes_and_executes_recurring_jobs() {
    let mut registry = HandlerRegistry::new();
    registry.register_fn(JobType::Print, |_| Ok(()));

    let store = Arc::new(MemoryStore::new());
    let cfg = QueueConfig {
        num_workers: 1,
        poll_interval: Duration::from_millis(20),
        recurring_interval: Duration::from_millis(50),
    };
    let queue = JobQueue::new(store.clone(), registry, cfg);

    let started = Utc::now();
    // yearly, so a second firing cannot sneak in during the test
    let rj = definition("0 0 1 1 *", started - chrono::Duration::minutes(10));
    store.insert_recurring(rj.clone()).unwrap();

    let running = queue.start();
    assert!(
        wait_until(Duration::from_secs(5), || {
            store.count_with_status(JobStatus::Completed) == 1
        })
        .await
    );
    running.shutdown().await;

    assert_eq!(store.jobs().len(), 1);
    assert!(next_run(&store, rj.id) > started);
}
