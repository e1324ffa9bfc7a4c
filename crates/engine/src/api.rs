// SPDX-License-Identifier: MIT

//! Public engine API — the surface the admin UI and any other caller
//! drive this crate through. Everything here either enqueues a broker job
//! for a worker to pick up later, or reads back state; none of it runs a
//! scrape/export inline.

use crate::cancellation::CancellationService;
use crate::error::{EngineError, Result};
use crate::instagram::InstagramBatchCoordinator;
use es_broker::JobBroker;
use es_core::{BrokerJobId, CancelAction, Clock, JobStatusView, QueueName, Run, ScheduleId};
use es_storage::ScheduleRepo;
use std::sync::Arc;

pub struct EngineApi<C: Clock> {
    schedules: Arc<dyn ScheduleRepo>,
    broker: Arc<dyn JobBroker>,
    coordinator: Arc<InstagramBatchCoordinator<C>>,
    cancellation: CancellationService<C>,
}

impl<C: Clock> EngineApi<C> {
    pub fn new(
        schedules: Arc<dyn ScheduleRepo>,
        broker: Arc<dyn JobBroker>,
        coordinator: Arc<InstagramBatchCoordinator<C>>,
        cancellation: CancellationService<C>,
    ) -> Self {
        Self { schedules, broker, coordinator, cancellation }
    }

    /// Enqueue an immediate, one-off firing of an active schedule, ahead
    /// of its own cron. The schedule-queue worker creates the Run once it
    /// claims the job, same as a regular promoted firing.
    pub async fn trigger_schedule_now(&self, schedule_id: ScheduleId) -> Result<BrokerJobId> {
        let schedule = self.schedules.get(schedule_id).await?;
        if !schedule.active {
            return Err(EngineError::ScheduleInactive(schedule_id));
        }
        let payload = serde_json::json!({
            "scheduleId": schedule.id.get(),
            "scheduleType": schedule.schedule_type.to_string(),
        });
        let job = self.broker.enqueue_immediate(QueueName::Schedule, payload).await?;
        Ok(job.id)
    }

    /// Fan out to every active Instagram source right now, independent of
    /// any schedule.
    pub async fn trigger_all_active_instagram_scrapes(&self, options: serde_json::Value) -> Result<Run> {
        self.coordinator.trigger_all_active(options).await
    }

    /// Look up current broker state for a batch of job ids.
    pub async fn get_job_statuses(&self, job_ids: Vec<String>) -> Result<Vec<JobStatusView>> {
        let mut statuses = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            let view = self.broker.get_job_status(&BrokerJobId::from_string(&job_id)).await?;
            statuses.push(view);
        }
        Ok(statuses)
    }

    /// Cancel a batch of jobs.
    pub async fn cancel_jobs(&self, job_ids: Vec<String>) -> Result<Vec<(String, CancelAction)>> {
        Ok(self.cancellation.cancel_jobs(job_ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RunRecorder;
    use es_broker::FakeBroker;
    use es_core::{FakeClock, ScheduleBuilder, ScheduleType, SourceBuilder, SourceType};
    use es_storage::{FakeRunRepo, FakeScheduleRepo, FakeSourceRepo};

    fn api(schedules: Vec<es_core::Schedule>, sources: Vec<es_core::Source>) -> EngineApi<FakeClock> {
        let schedule_repo = Arc::new(FakeScheduleRepo::new(schedules));
        let source_repo = Arc::new(FakeSourceRepo::new(sources));
        let run_repo = Arc::new(FakeRunRepo::new());
        let broker = Arc::new(FakeBroker::new());
        let recorder = Arc::new(RunRecorder::new(run_repo, FakeClock::default()));
        let coordinator = Arc::new(InstagramBatchCoordinator::new(source_repo, broker.clone(), recorder.clone()));
        let cancellation = CancellationService::new(broker.clone(), recorder);
        EngineApi::new(schedule_repo, broker, coordinator, cancellation)
    }

    #[tokio::test]
    async fn trigger_schedule_now_enqueues_a_job() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::Scrape)
            .source_id(es_core::SourceId::new(1))
            .build();
        let api = api(vec![schedule], vec![]);

        let job_id = api.trigger_schedule_now(ScheduleId::new(1)).await.expect("trigger");
        let status = api.get_job_statuses(vec![job_id.to_string()]).await.expect("status");
        assert_eq!(status.len(), 1);
    }

    #[tokio::test]
    async fn trigger_schedule_now_rejects_inactive_schedule() {
        let schedule = ScheduleBuilder::default().id(ScheduleId::new(1)).active(false).build();
        let api = api(vec![schedule], vec![]);

        let err = api.trigger_schedule_now(ScheduleId::new(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::ScheduleInactive(_)));
    }

    #[tokio::test]
    async fn trigger_all_active_instagram_scrapes_delegates_to_coordinator() {
        let source = SourceBuilder::default().id(es_core::SourceId::new(1)).source_type(SourceType::Instagram).build();
        let api = api(vec![], vec![source]);

        let parent = api.trigger_all_active_instagram_scrapes(serde_json::json!({})).await.expect("trigger");
        assert!(matches!(parent.metadata_kind(), Some(es_core::RunMetadataKind::InstagramBatch { .. })));
    }

    #[tokio::test]
    async fn get_job_statuses_reports_missing_for_unknown_ids() {
        let api = api(vec![], vec![]);
        let statuses = api.get_job_statuses(vec!["job-nope".to_string()]).await.expect("status");
        assert_eq!(statuses[0].state, es_core::JobStatusState::Missing);
    }

    #[tokio::test]
    async fn cancel_jobs_delegates_to_cancellation_service() {
        let api = api(vec![], vec![]);
        let results = api.cancel_jobs(vec!["job-nope".to_string()]).await.expect("cancel");
        assert_eq!(results, vec![("job-nope".to_string(), CancelAction::Missing)]);
    }
}
