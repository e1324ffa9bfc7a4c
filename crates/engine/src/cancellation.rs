// SPDX-License-Identifier: MIT

//! Cancellation Service (C5) — classifies and actions a batch of
//! cancellation requests against broker job ids, rolling the Run Recorder
//! forward for whichever outcome the classification produced.

use crate::error::Result;
use crate::recorder::RunRecorder;
use es_broker::JobBroker;
use es_core::{BrokerJobId, CancelAction, Clock, RunStatus};
use std::sync::Arc;
use tracing::info;

pub struct CancellationService<C: Clock> {
    broker: Arc<dyn JobBroker>,
    recorder: Arc<RunRecorder<C>>,
}

impl<C: Clock> CancellationService<C> {
    pub fn new(broker: Arc<dyn JobBroker>, recorder: Arc<RunRecorder<C>>) -> Self {
        Self { broker, recorder }
    }

    /// Cancel each of `job_ids` independently: a failure classifying or
    /// actioning one id never aborts the rest of the batch.
    pub async fn cancel_jobs(&self, job_ids: Vec<String>) -> Result<Vec<(String, CancelAction)>> {
        let mut results = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            let action = self.cancel_one(&job_id).await?;
            results.push((job_id, action));
        }
        Ok(results)
    }

    async fn cancel_one(&self, job_id: &str) -> Result<CancelAction> {
        let broker_job_id = BrokerJobId::from_string(job_id);
        let action = es_broker::cancel_one(self.broker.as_ref(), &broker_job_id).await?;

        match action {
            CancelAction::CancelRequested => {
                if let Some(mut run) = self.recorder.find_by_job_id(job_id).await? {
                    run.set_cancel_requested();
                    self.recorder.save_metadata(&run).await?;
                }
            }
            // Not found in broker, or found but not yet started: there is
            // no separate `cancelled` Run status, so "mark Run cancelled"
            // lands on `partial` with whatever counters the Run already
            // carried.
            CancelAction::Removed | CancelAction::Missing => {
                if let Some(run) = self.recorder.find_by_job_id(job_id).await? {
                    if !run.status.is_terminal() {
                        self.recorder.finish(run.id, RunStatus::Partial, run.events_found, run.pages_crawled).await?;
                    }
                }
            }
            CancelAction::AlreadyFinished => {}
        }

        info!(%job_id, %action, "cancellation processed");
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_broker::FakeBroker;
    use es_core::{FakeClock, SourceId};
    use es_storage::FakeRunRepo;

    fn service(broker: Arc<FakeBroker>, runs: Arc<FakeRunRepo>) -> CancellationService<FakeClock> {
        let recorder = Arc::new(RunRecorder::new(runs, FakeClock::default()));
        CancellationService::new(broker, recorder)
    }

    #[tokio::test]
    async fn waiting_job_is_removed_and_run_marked_partial() {
        let broker = Arc::new(FakeBroker::new());
        let runs = Arc::new(FakeRunRepo::new());
        let job = broker.enqueue_immediate(es_core::QueueName::Schedule, serde_json::json!({})).await.expect("enqueue");

        let run = es_core::Run::builder().source_id(SourceId::new(1)).build();
        let mut run = runs.create(&run).await.expect("create run");
        run.set_job_id(job.id.as_str());
        runs.update(&run).await.expect("update run");

        let service = service(broker.clone(), runs.clone());
        let results = service.cancel_jobs(vec![job.id.to_string()]).await.expect("cancel");
        assert_eq!(results, vec![(job.id.to_string(), CancelAction::Removed)]);

        let reloaded = runs.get(run.id).await.expect("reload");
        assert_eq!(reloaded.status, RunStatus::Partial, "waiting jobs that are removed still settle their run");
    }

    #[tokio::test]
    async fn active_job_sets_cancel_requested_on_its_run() {
        let broker = Arc::new(FakeBroker::new());
        let runs = Arc::new(FakeRunRepo::new());
        let job = broker.enqueue_immediate(es_core::QueueName::Schedule, serde_json::json!({})).await.expect("enqueue");
        broker.set_job_state(&job.id, es_core::BrokerJobState::Active).await.expect("set active");

        let run = es_core::Run::builder().source_id(SourceId::new(1)).build();
        let mut run = runs.create(&run).await.expect("create run");
        run.set_job_id(job.id.as_str());
        runs.update(&run).await.expect("update run");

        let service = service(broker, runs.clone());
        let results = service.cancel_jobs(vec![job.id.to_string()]).await.expect("cancel");
        assert_eq!(results, vec![(job.id.to_string(), CancelAction::CancelRequested)]);

        let reloaded = runs.get(run.id).await.expect("reload");
        assert!(reloaded.cancel_requested());
        assert_eq!(reloaded.status, RunStatus::Queued, "active jobs wait for their own checkpoint to settle");
    }

    #[tokio::test]
    async fn unknown_job_id_reports_missing_without_touching_unrelated_runs() {
        let broker = Arc::new(FakeBroker::new());
        let runs = Arc::new(FakeRunRepo::new());
        let service = service(broker, runs);

        let results = service.cancel_jobs(vec!["job-does-not-exist".to_string()]).await.expect("cancel");
        assert_eq!(results, vec![("job-does-not-exist".to_string(), CancelAction::Missing)]);
    }

    #[tokio::test]
    async fn missing_job_with_an_orphaned_run_marks_it_partial() {
        let broker = Arc::new(FakeBroker::new());
        let runs = Arc::new(FakeRunRepo::new());
        let run = es_core::Run::builder().source_id(SourceId::new(1)).build();
        let mut run = runs.create(&run).await.expect("create run");
        run.set_job_id("job-evicted");
        runs.update(&run).await.expect("update run");

        let service = service(broker, runs.clone());
        let results = service.cancel_jobs(vec!["job-evicted".to_string()]).await.expect("cancel");
        assert_eq!(results, vec![("job-evicted".to_string(), CancelAction::Missing)]);

        let reloaded = runs.get(run.id).await.expect("reload");
        assert_eq!(reloaded.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn cancelling_every_waiting_child_rolls_up_the_parent() {
        let broker = Arc::new(FakeBroker::new());
        let runs = Arc::new(FakeRunRepo::new());
        let recorder = Arc::new(RunRecorder::new(runs.clone(), FakeClock::default()));

        let parent = recorder.create(None, None, serde_json::json!({})).await.expect("create parent");
        let mut child_a = recorder.create(Some(SourceId::new(1)), Some(parent.id), serde_json::json!({})).await.expect("create child");
        let mut child_b = recorder.create(Some(SourceId::new(2)), Some(parent.id), serde_json::json!({})).await.expect("create child");

        let job_a = broker.enqueue_immediate(es_core::QueueName::Schedule, serde_json::json!({})).await.expect("enqueue");
        let job_b = broker.enqueue_immediate(es_core::QueueName::Schedule, serde_json::json!({})).await.expect("enqueue");
        child_a.set_job_id(job_a.id.as_str());
        recorder.save_metadata(&child_a).await.expect("save");
        child_b.set_job_id(job_b.id.as_str());
        recorder.save_metadata(&child_b).await.expect("save");

        let service = CancellationService::new(broker, recorder.clone());
        let results = service.cancel_jobs(vec![job_a.id.to_string(), job_b.id.to_string()]).await.expect("cancel");
        assert!(results.iter().all(|(_, action)| *action == CancelAction::Removed));

        let final_parent = runs.get(parent.id).await.expect("reload parent");
        assert_eq!(final_parent.status, RunStatus::Partial, "a batch with no completed work rolls up to partial, never success");
        assert_eq!(final_parent.batch_summary().expect("summary").pending, 0);
    }
}
