// SPDX-License-Identifier: MIT

//! Instagram Batch Coordinator — fans a single trigger out into one parent
//! run and one child run per active Instagram source, enqueueing a broker
//! job onto the Instagram scrape queue for each child.

use crate::error::{EngineError, Result};
use crate::recorder::RunRecorder;
use es_broker::JobBroker;
use es_core::{Clock, QueueName, RunMetadataKind};
use es_storage::SourceRepo;
use std::sync::Arc;
use tracing::info;

pub struct InstagramBatchCoordinator<C: Clock> {
    sources: Arc<dyn SourceRepo>,
    broker: Arc<dyn JobBroker>,
    recorder: Arc<RunRecorder<C>>,
}

impl<C: Clock> InstagramBatchCoordinator<C> {
    pub fn new(sources: Arc<dyn SourceRepo>, broker: Arc<dyn JobBroker>, recorder: Arc<RunRecorder<C>>) -> Self {
        Self { sources, broker, recorder }
    }

    /// Fan out to every active Instagram source.
    ///
    /// Each child run's `jobId` is set only after the broker accepts the
    /// enqueue, so a run that exists without a `jobId` unambiguously means
    /// "the broker never saw this job" rather than "something raced".
    pub async fn trigger_all_active(&self, options: serde_json::Value) -> Result<es_core::Run> {
        let accounts = self.sources.list_active_instagram().await?;
        if accounts.is_empty() {
            return Err(EngineError::NoActiveInstagramAccounts);
        }

        let batch_metadata = serde_json::to_value(RunMetadataKind::InstagramBatch {
            accounts_total: accounts.len() as u32,
            options: options.clone(),
        })
        .unwrap_or(serde_json::Value::Null);
        let parent = self.recorder.create(None, None, batch_metadata).await?;

        for (position, source) in accounts.iter().enumerate() {
            let account_metadata = serde_json::to_value(RunMetadataKind::InstagramAccount {
                instagram_account_id: source.id.get(),
                instagram_username: source.name.clone(),
                queue_position: position as u32,
            })
            .unwrap_or(serde_json::Value::Null);
            let child = self.recorder.create(Some(source.id), Some(parent.id), account_metadata).await?;

            let payload = serde_json::json!({
                "runId": child.id.get(),
                "sourceId": source.id.get(),
                "scheduleType": "instagram_scrape",
                "options": options,
            });
            let job = self.broker.enqueue_immediate(QueueName::InstagramScrape, payload).await?;

            let mut child = child;
            child.set_job_id(job.id.as_str());
            self.recorder_update_job_id(&child).await?;
        }

        info!(parent_run_id = %parent.id, accounts = accounts.len(), "instagram batch dispatched");
        let parent = self.recorder.rollup(parent.id).await?;
        Ok(parent)
    }

    async fn recorder_update_job_id(&self, run: &es_core::Run) -> Result<()> {
        self.recorder.save_metadata(run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_broker::FakeBroker;
    use es_core::{FakeClock, SourceBuilder, SourceType};
    use es_storage::{FakeRunRepo, FakeSourceRepo};

    fn coordinator(sources: Vec<es_core::Source>) -> InstagramBatchCoordinator<FakeClock> {
        let source_repo = Arc::new(FakeSourceRepo::new(sources));
        let broker = Arc::new(FakeBroker::new());
        let recorder = Arc::new(RunRecorder::new(Arc::new(FakeRunRepo::new()), FakeClock::default()));
        InstagramBatchCoordinator::new(source_repo, broker, recorder)
    }

    #[tokio::test]
    async fn fans_out_one_child_per_active_instagram_source() {
        let sources = vec![
            SourceBuilder::default().id(es_core::SourceId::new(1)).source_type(SourceType::Instagram).build(),
            SourceBuilder::default().id(es_core::SourceId::new(2)).source_type(SourceType::Instagram).build(),
            SourceBuilder::default().id(es_core::SourceId::new(3)).source_type(SourceType::Website).build(),
        ];
        let coordinator = coordinator(sources);

        let parent = coordinator.trigger_all_active(serde_json::json!({})).await.expect("trigger");
        match parent.metadata_kind() {
            Some(es_core::RunMetadataKind::InstagramBatch { accounts_total, .. }) => {
                assert_eq!(accounts_total, 2, "website source must not be included");
            }
            other => panic!("expected InstagramBatch metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_active_instagram_sources_is_an_error() {
        let coordinator = coordinator(vec![]);
        let err = coordinator.trigger_all_active(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::NoActiveInstagramAccounts));
    }
}
