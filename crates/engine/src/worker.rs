// SPDX-License-Identifier: MIT

//! Scrape-queue and Instagram-scrape-queue worker pools.
//!
//! Each queue's worker owns the run it claims end to end: it starts the
//! run, drives the collaborator adapter under cooperative cancellation,
//! and finishes the run. Neither worker ever creates a Run row — that
//! stays the schedule-queue dispatcher's job, which hands off a run id
//! already bound to the job it enqueues here.

use crate::error::{EngineError, Result};
use crate::recorder::RunRecorder;
use es_adapters::{InstagramWorker, ScraperRegistry};
use es_broker::{CancelFlagStore, JobBroker};
use es_core::{BrokerJobId, BrokerJobState, CancelFlagValue, Clock, QueueName, RunId, RunStatus};
use es_storage::SourceRepo;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Debug, serde::Deserialize)]
struct WorkerPayload {
    #[serde(rename = "runId")]
    run_id: i64,
}

/// Claims jobs off `scrape-queue` and drives each to a finished Run.
pub struct ScrapeWorker<C: Clock> {
    sources: Arc<dyn SourceRepo>,
    broker: Arc<dyn JobBroker>,
    recorder: Arc<RunRecorder<C>>,
    scrapers: Arc<ScraperRegistry>,
}

impl<C: Clock> ScrapeWorker<C> {
    pub fn new(
        sources: Arc<dyn SourceRepo>,
        broker: Arc<dyn JobBroker>,
        recorder: Arc<RunRecorder<C>>,
        scrapers: Arc<ScraperRegistry>,
    ) -> Self {
        Self { sources, broker, recorder, scrapers }
    }

    /// Claim and process one job, if any is waiting. Returns whether a
    /// job was claimed, so the daemon's poll loop knows whether to back
    /// off before the next tick.
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(job_id) = self.broker.claim_next(QueueName::Scrape).await? else {
            return Ok(false);
        };
        self.process(&job_id).await?;
        Ok(true)
    }

    async fn process(&self, job_id: &BrokerJobId) -> Result<()> {
        let Some(job) = self.broker.get_job(job_id).await? else {
            warn!(%job_id, "claimed scrape job vanished before processing");
            return Ok(());
        };
        let payload: WorkerPayload = serde_json::from_value(job.payload.clone()).map_err(|err| {
            error!(%job_id, %err, "malformed scrape job payload");
            EngineError::Broker(es_broker::BrokerError::MalformedRecord {
                job_id: job_id.to_string(),
                reason: err.to_string(),
            })
        })?;

        self.broker.set_job_state(job_id, BrokerJobState::Active).await?;
        let outcome = self.run_scrape(job_id, RunId::new(payload.run_id)).await;
        match outcome {
            Ok(()) => self.broker.set_job_state(job_id, BrokerJobState::Completed).await?,
            Err(ref err) => {
                error!(%job_id, %err, "scrape job failed");
                self.broker.set_job_state(job_id, BrokerJobState::Failed).await?;
            }
        }
        outcome
    }

    async fn run_scrape(&self, job_id: &BrokerJobId, run_id: RunId) -> Result<()> {
        let run = self.recorder.start(run_id).await?;
        let source_id = run.source_id.ok_or_else(|| missing_field("source_id"))?;
        let source = self.sources.get(source_id).await?;
        let module = self.scrapers.get(&source.module_key)?;

        let outcome = with_cooperative_cancellation(&self.broker, job_id, |token| async move { module.scrape(&source, &token).await }).await;
        finish_from_scrape(&self.recorder, run_id, outcome).await
    }
}

/// Claims jobs off `instagram-scrape-queue` and drives each to a finished
/// child Run.
pub struct InstagramAccountWorker<C: Clock> {
    sources: Arc<dyn SourceRepo>,
    broker: Arc<dyn JobBroker>,
    recorder: Arc<RunRecorder<C>>,
    instagram_worker: Arc<dyn InstagramWorker>,
}

impl<C: Clock> InstagramAccountWorker<C> {
    pub fn new(
        sources: Arc<dyn SourceRepo>,
        broker: Arc<dyn JobBroker>,
        recorder: Arc<RunRecorder<C>>,
        instagram_worker: Arc<dyn InstagramWorker>,
    ) -> Self {
        Self { sources, broker, recorder, instagram_worker }
    }

    pub async fn poll_once(&self) -> Result<bool> {
        let Some(job_id) = self.broker.claim_next(QueueName::InstagramScrape).await? else {
            return Ok(false);
        };
        self.process(&job_id).await?;
        Ok(true)
    }

    async fn process(&self, job_id: &BrokerJobId) -> Result<()> {
        let Some(job) = self.broker.get_job(job_id).await? else {
            warn!(%job_id, "claimed instagram job vanished before processing");
            return Ok(());
        };
        let payload: WorkerPayload = serde_json::from_value(job.payload.clone()).map_err(|err| {
            error!(%job_id, %err, "malformed instagram job payload");
            EngineError::Broker(es_broker::BrokerError::MalformedRecord {
                job_id: job_id.to_string(),
                reason: err.to_string(),
            })
        })?;

        self.broker.set_job_state(job_id, BrokerJobState::Active).await?;
        let outcome = self.run_instagram_account(job_id, RunId::new(payload.run_id)).await;
        match outcome {
            Ok(()) => self.broker.set_job_state(job_id, BrokerJobState::Completed).await?,
            Err(ref err) => {
                error!(%job_id, %err, "instagram job failed");
                self.broker.set_job_state(job_id, BrokerJobState::Failed).await?;
            }
        }
        outcome
    }

    async fn run_instagram_account(&self, job_id: &BrokerJobId, run_id: RunId) -> Result<()> {
        let run = self.recorder.start(run_id).await?;
        let source_id = run.source_id.ok_or_else(|| missing_field("source_id"))?;
        let source = self.sources.get(source_id).await?;
        let worker = self.instagram_worker.clone();

        let outcome =
            with_cooperative_cancellation(&self.broker, job_id, |token| async move { worker.scrape_account(&source, &token).await }).await;
        finish_from_scrape(&self.recorder, run_id, outcome).await
    }
}

async fn finish_from_scrape<C: Clock>(
    recorder: &RunRecorder<C>,
    run_id: RunId,
    outcome: Result<es_adapters::ScrapeOutcome>,
) -> Result<()> {
    match outcome {
        Ok(outcome) => {
            recorder.finish(run_id, RunStatus::Success, outcome.events_found, outcome.pages_crawled).await?;
            Ok(())
        }
        Err(EngineError::Adapter(es_adapters::AdapterError::Cancelled)) => {
            recorder.finish(run_id, RunStatus::Partial, 0, 0).await?;
            Ok(())
        }
        Err(err) => {
            recorder.finish(run_id, RunStatus::Error, 0, 0).await?;
            Err(err)
        }
    }
}

/// Run `work` to completion while watching this job's cancel flag; on
/// observing `Requested`, cancels the token so `work` can unwind early.
/// Only the Cancellation Service ever writes `Cancelled` back to the
/// broker — this loop only ever reads the flag.
async fn with_cooperative_cancellation<F, Fut>(
    broker: &Arc<dyn JobBroker>,
    job_id: &BrokerJobId,
    work: F,
) -> Result<es_adapters::ScrapeOutcome>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = es_adapters::Result<es_adapters::ScrapeOutcome>>,
{
    let token = CancellationToken::new();
    let watcher_token = token.clone();
    let broker = Arc::clone(broker);
    let watched_job_id = job_id.clone();
    let watcher = tokio::spawn(async move {
        loop {
            if watcher_token.is_cancelled() {
                return;
            }
            match broker.get_cancel_flag(&watched_job_id).await {
                Ok(Some(CancelFlagValue::Requested)) => {
                    watcher_token.cancel();
                    return;
                }
                _ => tokio::time::sleep(Duration::from_millis(200)).await,
            }
        }
    });

    let result = work(token.clone()).await;
    token.cancel();
    watcher.abort();
    Ok(result?)
}

fn missing_field(field: &'static str) -> EngineError {
    EngineError::Broker(es_broker::BrokerError::MalformedRecord {
        job_id: "unknown".to_string(),
        reason: format!("missing field {field:?}"),
    })
}
