use cronflow::config;
use cronflow::db;
use cronflow::jobs::{JobQueue, JobsRepo};

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod handlers;
use handlers::{build_registry, MailgunConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cfg = config::Config::from_env()?;

    info!(
        num_workers = cfg.num_workers,
        poll_interval_ms = cfg.poll_interval_ms,
        recurring_interval_secs = cfg.recurring_interval_secs,
        migrate_on_startup = cfg.migrate_on_startup,
        db_max_connections = cfg.db.max_connections,
        "cronflow worker starting"
    );

    let pool = db::make_pool(&cfg.database_url, &cfg.db).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let store = Arc::new(JobsRepo::new(pool));
    let registry = build_registry(MailgunConfig::from_env());
    let queue = JobQueue::new(store, registry, cfg.queue_config());

    let running = queue.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for in-flight jobs");
    running.shutdown().await;

    Ok(())
}
