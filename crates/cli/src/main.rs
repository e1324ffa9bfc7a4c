// SPDX-License-Identifier: MIT

//! `es`: operator CLI for the job-orchestration core.
//!
//! Talks directly to the same Postgres/Redis the daemon uses rather than
//! through a wire protocol to a running daemon process — the exposed
//! operations are a function-call contract, not a network one, so this
//! binary links `es-engine` and constructs its own `EngineApi`.

mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use es_broker::RedisBroker;
use es_core::{CancelAction, ScheduleId, SystemClock};
use es_engine::{CancellationService, EngineApi, InstagramBatchCoordinator, RunRecorder};
use es_storage::{PgRunRepo, PgScheduleRepo, PgSourceRepo};
use exit_error::ExitError;
use output::OutputFormat;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "es", version, about = "Control the schedule promoter and job broker")]
struct Cli {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fire a schedule immediately, ahead of its own cron.
    TriggerNow {
        /// Schedule id to fire.
        schedule_id: i64,
    },
    /// Fan out an immediate Instagram scrape across every active account.
    TriggerInstagram {
        #[arg(long)]
        post_limit: Option<i64>,
        #[arg(long)]
        account_limit: Option<i64>,
        #[arg(long)]
        batch_size: Option<i64>,
    },
    /// Look up current broker state for one or more job ids.
    Status {
        /// Job ids to look up.
        job_ids: Vec<String>,
    },
    /// Request cancellation of one or more jobs.
    Cancel {
        /// Job ids to cancel.
        job_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if let Some(exit_err) = err.downcast_ref::<ExitError>() {
            eprintln!("error: {exit_err}");
            std::process::exit(exit_err.code);
        }
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/events".to_string());
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let pool = es_storage::connect_and_migrate(&database_url).await?;
    let broker: Arc<dyn es_broker::JobBroker> = Arc::new(RedisBroker::connect(&redis_url).await?);
    let sources = Arc::new(PgSourceRepo::new(pool.clone()));
    let schedules = Arc::new(PgScheduleRepo::new(pool.clone()));
    let runs = Arc::new(PgRunRepo::new(pool));

    let recorder = Arc::new(RunRecorder::new(runs, SystemClock));
    let coordinator = Arc::new(InstagramBatchCoordinator::new(sources, broker.clone(), recorder.clone()));
    let cancellation = CancellationService::new(broker.clone(), recorder);
    let api = EngineApi::new(schedules, broker, coordinator, cancellation);

    match cli.command {
        Command::TriggerNow { schedule_id } => {
            let job_id = api
                .trigger_schedule_now(ScheduleId::new(schedule_id))
                .await
                .map_err(|err| ExitError::new(1, err.to_string()))?;
            println!("enqueued {job_id}");
        }
        Command::TriggerInstagram { post_limit, account_limit, batch_size } => {
            let mut options = serde_json::Map::new();
            if let Some(v) = post_limit {
                options.insert("postLimit".to_string(), serde_json::json!(v));
            }
            if let Some(v) = account_limit {
                options.insert("accountLimit".to_string(), serde_json::json!(v));
            }
            if let Some(v) = batch_size {
                options.insert("batchSize".to_string(), serde_json::json!(v));
            }
            let parent = api
                .trigger_all_active_instagram_scrapes(serde_json::Value::Object(options))
                .await
                .map_err(|err| ExitError::new(1, err.to_string()))?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parent)?),
                OutputFormat::Text => println!("parent run {}", parent.id),
            }
        }
        Command::Status { job_ids } => {
            let statuses = api.get_job_statuses(job_ids).await.map_err(|err| ExitError::new(1, err.to_string()))?;
            output::print_job_statuses(&statuses, cli.format)?;
        }
        Command::Cancel { job_ids } => {
            let results: Vec<(String, CancelAction)> =
                api.cancel_jobs(job_ids).await.map_err(|err| ExitError::new(1, err.to_string()))?;
            output::print_cancel_results(&results, cli.format)?;
        }
    }

    Ok(())
}
