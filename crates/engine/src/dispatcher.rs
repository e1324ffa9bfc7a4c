// SPDX-License-Identifier: MIT

//! Dispatcher — the schedule-queue consumer. It claims a waiting
//! schedule-queue job, creates whatever Run row(s) the firing needs, and
//! either hands the work off to a dedicated queue (scrape, Instagram) or,
//! for WordPress export, runs it synchronously inline. The dispatcher
//! never mutates a Run past creation; everything after that belongs to
//! the queue-scoped worker that owns it.

use crate::error::{EngineError, Result};
use crate::instagram::InstagramBatchCoordinator;
use crate::recorder::RunRecorder;
use es_adapters::WordpressExporter;
use es_broker::JobBroker;
use es_core::{BrokerJobId, BrokerJobState, Clock, QueueName, RunStatus};
use es_storage::ScheduleRepo;
use std::sync::Arc;
use tracing::{error, warn};

/// Deserialized shape of a schedule-queue job payload. Every field but
/// `schedule_type` is optional because the promoter and `triggerScheduleNow`
/// fill in the same subset either way.
#[derive(Debug, serde::Deserialize)]
struct JobPayload {
    #[serde(rename = "scheduleType")]
    schedule_type: String,
    #[serde(rename = "scheduleId")]
    schedule_id: Option<i64>,
    #[serde(default)]
    options: serde_json::Value,
}

pub struct Dispatcher<C: Clock> {
    schedules: Arc<dyn ScheduleRepo>,
    broker: Arc<dyn JobBroker>,
    recorder: Arc<RunRecorder<C>>,
    coordinator: Arc<InstagramBatchCoordinator<C>>,
    wordpress_exporter: Arc<dyn WordpressExporter>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        schedules: Arc<dyn ScheduleRepo>,
        broker: Arc<dyn JobBroker>,
        recorder: Arc<RunRecorder<C>>,
        coordinator: Arc<InstagramBatchCoordinator<C>>,
        wordpress_exporter: Arc<dyn WordpressExporter>,
    ) -> Self {
        Self { schedules, broker, recorder, coordinator, wordpress_exporter }
    }

    /// Process one job id claimed off `schedule-queue` by the daemon's
    /// poll loop.
    pub async fn dispatch(&self, job_id: &BrokerJobId) -> Result<()> {
        let Some(job) = self.broker.get_job(job_id).await? else {
            warn!(%job_id, "dispatched job vanished before processing");
            return Ok(());
        };
        let payload: JobPayload = serde_json::from_value(job.payload.clone()).map_err(|err| {
            error!(%job_id, %err, "malformed job payload");
            EngineError::Broker(es_broker::BrokerError::MalformedRecord {
                job_id: job_id.to_string(),
                reason: err.to_string(),
            })
        })?;

        self.broker.set_job_state(job_id, BrokerJobState::Active).await?;
        let outcome = self.run_payload(job_id, &payload).await;
        match outcome {
            Ok(()) => self.broker.set_job_state(job_id, BrokerJobState::Completed).await?,
            Err(err) => {
                error!(%job_id, %err, "job processing failed");
                self.broker.set_job_state(job_id, BrokerJobState::Failed).await?;
            }
        }
        Ok(())
    }

    async fn run_payload(&self, job_id: &BrokerJobId, payload: &JobPayload) -> Result<()> {
        match payload.schedule_type.as_str() {
            "scrape" => {
                let schedule_id = payload.schedule_id.ok_or_else(|| missing_field("scheduleId"))?;
                self.run_scheduled_scrape(es_core::ScheduleId::new(schedule_id)).await
            }
            "wordpress_export" => {
                let schedule_id = payload.schedule_id.ok_or_else(|| missing_field("scheduleId"))?;
                self.run_wordpress_export(es_core::ScheduleId::new(schedule_id)).await
            }
            "instagram_scrape" => {
                self.coordinator.trigger_all_active(payload.options.clone()).await?;
                Ok(())
            }
            other => Err(EngineError::Broker(es_broker::BrokerError::MalformedRecord {
                job_id: job_id.to_string(),
                reason: format!("unhandled schedule_type {other:?}"),
            })),
        }
    }

    /// Create the Run for a scheduled scrape and hand it off to
    /// `scrape-queue`; the scrape worker that claims it owns everything
    /// from `start` to `finish`.
    async fn run_scheduled_scrape(&self, schedule_id: es_core::ScheduleId) -> Result<()> {
        let schedule = self.schedules.get(schedule_id).await?;
        let source_id = schedule.source_id.ok_or(EngineError::ScheduleInactive(schedule_id))?;
        let metadata = serde_json::json!({ "type": "schedule_trigger", "scheduleId": schedule_id.get() });
        let mut run = self.recorder.create(Some(source_id), None, metadata).await?;

        let payload = serde_json::json!({ "runId": run.id.get(), "sourceId": source_id.get() });
        let job = self.broker.enqueue_immediate(QueueName::Scrape, payload).await?;
        run.set_job_id(job.id.as_str());
        self.recorder.save_metadata(&run).await?;
        Ok(())
    }

    /// WordPress export has no dedicated queue; it runs synchronously
    /// inline within the schedule-queue worker.
    async fn run_wordpress_export(&self, schedule_id: es_core::ScheduleId) -> Result<()> {
        let schedule = self.schedules.get(schedule_id).await?;
        let settings_id = schedule.wordpress_settings_id.ok_or(EngineError::ScheduleInactive(schedule_id))?;
        let metadata = serde_json::json!({ "type": "schedule_trigger", "scheduleId": schedule_id.get() });
        let run = self.recorder.create(None, None, metadata).await?;
        let run = self.recorder.start(run.id).await?;

        match self.wordpress_exporter.export(settings_id).await {
            Ok(outcome) => {
                self.recorder.finish(run.id, RunStatus::Success, outcome.events_exported, 0).await?;
                Ok(())
            }
            Err(err) => {
                self.recorder.finish(run.id, RunStatus::Error, 0, 0).await?;
                Err(EngineError::Adapter(err))
            }
        }
    }
}

fn missing_field(field: &'static str) -> EngineError {
    EngineError::Broker(es_broker::BrokerError::MalformedRecord {
        job_id: "unknown".to_string(),
        reason: format!("missing field {field:?}"),
    })
}
