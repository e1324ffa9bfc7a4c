// SPDX-License-Identifier: MIT

//! es-daemon (`esd`): runs the Schedule Promoter's sync and promotion
//! loops alongside the schedule-queue Dispatcher and the scrape/Instagram
//! queue workers' poll loops. A single process owns all of them; nothing
//! here assumes more than one instance runs against a given
//! database/broker pair, though the promoter's sync latch and the
//! broker's atomic claim make it safe to.

mod config;
mod unconfigured_adapters;

use config::Config;
use es_adapters::ScraperRegistry;
use es_broker::RedisBroker;
use es_core::{QueueName, SystemClock};
use es_engine::{
    CancellationService, Dispatcher, EngineApi, InstagramAccountWorker, InstagramBatchCoordinator, RunRecorder,
    ScrapeWorker, SchedulePromoter,
};
use es_storage::{PgRunRepo, PgScheduleRepo, PgSourceRepo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    info!(database_url = %redact(&config.database_url), redis_url = %redact(&config.redis_url), "starting");

    let pool = es_storage::connect_and_migrate(&config.database_url).await?;
    let broker: Arc<dyn es_broker::JobBroker> = Arc::new(RedisBroker::connect(&config.redis_url).await?);

    let sources = Arc::new(PgSourceRepo::new(pool.clone()));
    let schedules = Arc::new(PgScheduleRepo::new(pool.clone()));
    let runs = Arc::new(PgRunRepo::new(pool));

    let clock = SystemClock;
    let recorder = Arc::new(RunRecorder::new(runs.clone(), clock.clone()));
    let coordinator = Arc::new(InstagramBatchCoordinator::new(sources.clone(), broker.clone(), recorder.clone()));
    let promoter = Arc::new(SchedulePromoter::new(schedules.clone(), broker.clone(), clock));
    let cancellation = CancellationService::new(broker.clone(), recorder.clone());
    let _api = EngineApi::new(schedules.clone(), broker.clone(), coordinator.clone(), cancellation);

    // No scraper modules ship with this crate (external collaborators); a
    // real deployment registers its own before this point. The
    // Instagram/WordPress placeholders fail dispatch rather than silently
    // no-op so a misconfigured deployment is loud about it.
    let scrapers = Arc::new(ScraperRegistry::new());
    let instagram_worker = Arc::new(unconfigured_adapters::UnconfiguredInstagramWorker);
    let wordpress_exporter = Arc::new(unconfigured_adapters::UnconfiguredWordpressExporter);

    let dispatcher = Arc::new(Dispatcher::new(schedules, broker.clone(), recorder.clone(), coordinator, wordpress_exporter));
    let scrape_worker = Arc::new(ScrapeWorker::new(sources.clone(), broker.clone(), recorder.clone(), scrapers));
    let instagram_account_worker = Arc::new(InstagramAccountWorker::new(sources, broker.clone(), recorder, instagram_worker));

    info!("running initial schedule reconciliation");
    match promoter.sync().await {
        Ok(registered) => info!(registered, "initial reconciliation complete"),
        Err(err) => error!(%err, "initial reconciliation failed"),
    }

    let shutdown = tokio_util::sync::CancellationToken::new();

    let promote_task = tokio::spawn(promote_loop(promoter.clone(), config.clone(), shutdown.clone()));
    let sync_task = tokio::spawn(sync_loop(promoter, config.clone(), shutdown.clone()));
    let dispatch_task = tokio::spawn(dispatch_loop(dispatcher, broker.clone(), config.clone(), shutdown.clone()));
    let scrape_task = tokio::spawn(scrape_loop(scrape_worker, config.clone(), shutdown.clone()));
    let instagram_task = tokio::spawn(instagram_loop(instagram_account_worker, config, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();

    let _ = tokio::join!(promote_task, sync_task, dispatch_task, scrape_task, instagram_task);
    info!("shut down cleanly");
    Ok(())
}

async fn promote_loop<C: es_core::Clock>(
    promoter: Arc<SchedulePromoter<C>>,
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.promote_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                match promoter.promote(config.promote_lookahead, config.promote_batch_size).await {
                    Ok(produced) if produced > 0 => info!(produced, "promoted due jobs"),
                    Ok(_) => {}
                    Err(err) => error!(%err, "promotion tick failed"),
                }
            }
        }
    }
}

async fn sync_loop<C: es_core::Clock>(
    promoter: Arc<SchedulePromoter<C>>,
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.sync_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                match promoter.sync().await {
                    Ok(registered) if registered > 0 => info!(registered, "schedule sync tick"),
                    Ok(_) => {}
                    Err(err) => error!(%err, "schedule sync tick failed"),
                }
            }
        }
    }
}

async fn dispatch_loop<C: es_core::Clock>(
    dispatcher: Arc<Dispatcher<C>>,
    broker: Arc<dyn es_broker::JobBroker>,
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match broker.claim_next(QueueName::Schedule).await {
            Ok(Some(job_id)) => {
                if let Err(err) = dispatcher.dispatch(&job_id).await {
                    warn!(%job_id, %err, "dispatch failed");
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(config.dispatch_poll_interval) => {}
                }
            }
            Err(err) => {
                error!(%err, "claiming next schedule job failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn scrape_loop<C: es_core::Clock>(
    worker: Arc<ScrapeWorker<C>>,
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match worker.poll_once().await {
            Ok(true) => {}
            Ok(false) => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(config.dispatch_poll_interval) => {}
                }
            }
            Err(err) => {
                error!(%err, "scrape worker tick failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn instagram_loop<C: es_core::Clock>(
    worker: Arc<InstagramAccountWorker<C>>,
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match worker.poll_once().await {
            Ok(true) => {}
            Ok(false) => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(config.dispatch_poll_interval) => {}
                }
            }
            Err(err) => {
                error!(%err, "instagram worker tick failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match url.find('@') {
        Some(at) => match url.find("://") {
            Some(scheme_end) => format!("{}://***{}", &url[..scheme_end], &url[at..]),
            None => "***".to_string(),
        },
        None => url.to_string(),
    }
}
