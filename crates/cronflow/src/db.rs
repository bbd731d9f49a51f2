use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DbConfig;

/// Opens the Postgres pool used by [`JobsRepo`](crate::jobs::JobsRepo).
///
/// Each worker holds at most one connection at a time (claim or save), and
/// the recurring scheduler needs one more, so `max_connections` should be
/// at least `num_workers + 1` to keep claims from queueing on the pool.
pub async fn make_pool(database_url: &str, cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let disable_jit = cfg.disable_jit;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // the claim CTE is tiny; JIT compilation only adds latency
                if disable_jit {
                    sqlx::query("SET jit = OFF").execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    tracing::debug!(
        max_connections = cfg.max_connections,
        disable_jit,
        "database pool ready"
    );
    Ok(pool)
}

/// Applies the embedded migrations (`jobs`, `recurring_jobs`).
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}
