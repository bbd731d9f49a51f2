use chrono::Utc;
use cronflow::config::DbConfig;
use cronflow::db;
use cronflow::jobs::{CronSchedule, JobStore, JobType, JobsRepo, NewRecurringJob};
use std::env;

const USAGE: &str = "cronflowctl <command>\n\
    Commands:\n\
    - migrate\n\
    - reset\n\
    - seed <n>\n\
    - counts\n\
    - jobs [limit]\n\
    - add <job_type> <payload_json>\n\
    - add-recurring <job_type> <cron> <payload_json>\n\
    - recurring\n\
    - next <cron> [count]\n\
    \n\
    Uses DATABASE_URL or TEST_DATABASE_URL (not needed for `next`).\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    // pure commands first: no database needed
    if args[1] == "next" {
        let expr = args
            .get(2)
            .ok_or_else(|| anyhow::anyhow!("usage: cronflowctl next <cron> [count]"))?;
        let count: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);
        return print_next(expr, count);
    }

    let _ = dotenvy::dotenv();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = db::make_pool(&url, &DbConfig::from_env()).await?;
    let repo = JobsRepo::new(pool.clone());

    match args[1].as_str() {
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrate OK");
        }
        "reset" => {
            repo.reset().await?;
            println!("reset OK");
        }
        "seed" => {
            let n: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&repo, n).await?;
        }
        "counts" => show_counts(&repo).await?,
        "jobs" => {
            let limit: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
            for job in repo.list_jobs(limit).await? {
                println!(
                    "{} | {} | {} | {} | {}",
                    job.created_at.to_rfc3339(),
                    job.id,
                    job.job_type,
                    job.status,
                    job.payload_str()
                );
            }
        }
        "add" => {
            let (job_type, payload) = match (args.get(2), args.get(3)) {
                (Some(t), Some(p)) => (t, p),
                _ => anyhow::bail!("usage: cronflowctl add <job_type> <payload_json>"),
            };
            let payload = validated_json(payload)?;
            let job = repo
                .create_job(&JobType::from(job_type.as_str()), payload.as_bytes())
                .await?;
            println!("+ enqueued job {} id={}", job.job_type, job.id);
        }
        "add-recurring" => {
            let (job_type, expr, payload) = match (args.get(2), args.get(3), args.get(4)) {
                (Some(t), Some(c), Some(p)) => (t, c, p),
                _ => anyhow::bail!(
                    "usage: cronflowctl add-recurring <job_type> <cron> <payload_json>"
                ),
            };
            let payload = validated_json(payload)?;
            let next_run_at = CronSchedule::parse(expr)?.next_after(Utc::now())?;
            let rj = repo
                .create_recurring(NewRecurringJob {
                    job_type: JobType::from(job_type.as_str()),
                    payload: payload.into_bytes(),
                    cron_expr: expr.clone(),
                    next_run_at,
                })
                .await?;
            println!(
                "+ recurring {} cron={:?} id={} next_run_at={}",
                rj.job_type,
                rj.cron_expr,
                rj.id,
                rj.next_run_at.to_rfc3339()
            );
        }
        "recurring" => {
            for rj in repo.list_recurring().await? {
                println!(
                    "{} | {} | {:?} | next_run_at={}",
                    rj.id,
                    rj.job_type,
                    rj.cron_expr,
                    rj.next_run_at.to_rfc3339()
                );
            }
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_next(expr: &str, count: usize) -> anyhow::Result<()> {
    let schedule = CronSchedule::parse(expr)?;
    let mut t = Utc::now();
    for _ in 0..count {
        t = schedule.next_after(t)?;
        println!("{}", t.to_rfc3339());
    }
    Ok(())
}

fn validated_json(raw: &str) -> anyhow::Result<String> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("payload is not valid JSON: {e}"))?;
    Ok(value.to_string())
}

async fn seed(repo: &JobsRepo, n: i64) -> anyhow::Result<()> {
    for i in 0..n {
        let payload = serde_json::json!({ "message": format!("seed #{i}") }).to_string();
        let job = repo.create_job(&JobType::Print, payload.as_bytes()).await?;
        println!("+ inserted job {} id={}", job.job_type, job.id);
    }
    Ok(())
}

async fn show_counts(repo: &JobsRepo) -> anyhow::Result<()> {
    let counts = repo.status_counts().await?;
    let line = counts
        .iter()
        .map(|(status, n)| format!("{status}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("jobs: {line}");
    Ok(())
}
