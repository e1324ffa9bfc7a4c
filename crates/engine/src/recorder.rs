// SPDX-License-Identifier: MIT

//! Run Recorder (C4) — run lifecycle and parent/child rollup.

use crate::error::Result;
use es_core::{BatchSummary, Clock, Run, RunId, RunStatus, SourceId};
use es_storage::RunRepo;
use std::sync::Arc;

pub struct RunRecorder<C: Clock> {
    runs: Arc<dyn RunRepo>,
    clock: C,
}

impl<C: Clock> RunRecorder<C> {
    pub fn new(runs: Arc<dyn RunRepo>, clock: C) -> Self {
        Self { runs, clock }
    }

    /// Create a new run in `Queued` (status machine entry point).
    pub async fn create(&self, source_id: Option<SourceId>, parent_run_id: Option<RunId>, metadata: serde_json::Value) -> Result<Run> {
        let run = Run {
            id: RunId::new(0), // assigned by the store on create
            source_id,
            status: RunStatus::Queued,
            started_at: None,
            finished_at: None,
            events_found: 0,
            pages_crawled: 0,
            parent_run_id,
            metadata,
        };
        Ok(self.runs.create(&run).await?)
    }

    /// Persist a run whose fields (typically `metadata`) were modified
    /// in-place by the caller, e.g. after binding a broker `jobId`.
    pub async fn save_metadata(&self, run: &Run) -> Result<()> {
        Ok(self.runs.update(run).await?)
    }

    /// Look up a run by the broker `jobId` stashed in its metadata, the
    /// reverse lookup cancellation needs to go from job id to Run.
    pub async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Run>> {
        Ok(self.runs.find_by_job_id(job_id).await?)
    }

    pub async fn start(&self, run_id: RunId) -> Result<Run> {
        let mut run = self.runs.get(run_id).await?;
        run.status = RunStatus::Running;
        run.started_at = Some(self.clock.now());
        self.runs.update(&run).await?;
        Ok(run)
    }

    /// Stamp a run terminal and, if it has a parent, roll the parent's
    /// batch summary and status forward.
    pub async fn finish(&self, run_id: RunId, status: RunStatus, events_found: i64, pages_crawled: i64) -> Result<Run> {
        debug_assert!(status.is_terminal(), "finish() requires a terminal RunStatus");
        let mut run = self.runs.get(run_id).await?;
        run.status = status;
        run.events_found = events_found;
        run.pages_crawled = pages_crawled;
        run.finished_at = Some(self.clock.now());
        self.runs.update(&run).await?;

        if let Some(parent_run_id) = run.parent_run_id {
            self.rollup(parent_run_id).await?;
        }
        Ok(run)
    }

    /// Recompute a parent's `BatchSummary` from its children and, once all
    /// children have reached a terminal state, finalize the parent's own
    /// status: `Success` if none failed, `Partial` otherwise. A parent
    /// never lands in `Error` — only `partial`-with-zero-successes, since
    /// a parent's status is derived purely from whether any child failed,
    /// not how many. Once finalized, the parent's own counters become the
    /// sum of its children's, so a batch's totals can be read off the
    /// parent alone.
    pub async fn rollup(&self, parent_run_id: RunId) -> Result<Run> {
        let children = self.runs.list_children(parent_run_id).await?;
        let total = children.len() as i64;
        let success = children.iter().filter(|c| c.status == RunStatus::Success).count() as i64;
        let failed = children.iter().filter(|c| matches!(c.status, RunStatus::Error | RunStatus::Partial)).count() as i64;
        let pending = children.iter().filter(|c| !c.status.is_terminal()).count() as i64;

        let mut parent = self.runs.get(parent_run_id).await?;
        parent.set_batch_summary(BatchSummary { total, success, failed, pending });

        if pending == 0 && total > 0 {
            parent.status = if failed > 0 { RunStatus::Partial } else { RunStatus::Success };
            parent.finished_at = Some(self.clock.now());
            parent.events_found = children.iter().map(|c| c.events_found).sum();
            parent.pages_crawled = children.iter().map(|c| c.pages_crawled).sum();
        }
        self.runs.update(&parent).await?;
        Ok(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_core::{FakeClock, RunMetadataKind};
    use es_storage::FakeRunRepo;

    fn recorder() -> RunRecorder<FakeClock> {
        RunRecorder::new(Arc::new(FakeRunRepo::new()), FakeClock::default())
    }

    #[tokio::test]
    async fn finish_without_parent_leaves_nothing_to_rollup() {
        let recorder = recorder();
        let run = recorder.create(Some(SourceId::new(1)), None, serde_json::json!({})).await.expect("create");
        recorder.start(run.id).await.expect("start");
        let finished = recorder.finish(run.id, RunStatus::Success, 5, 2).await.expect("finish");
        assert_eq!(finished.status, RunStatus::Success);
        assert_eq!(finished.events_found, 5);
    }

    #[tokio::test]
    async fn rollup_marks_parent_success_when_all_children_succeed() {
        let recorder = recorder();
        let parent = recorder
            .create(
                None,
                None,
                serde_json::to_value(RunMetadataKind::InstagramBatch { accounts_total: 2, options: serde_json::Value::Null })
                    .expect("serialize"),
            )
            .await
            .expect("create parent");
        let child_a = recorder.create(Some(SourceId::new(1)), Some(parent.id), serde_json::json!({})).await.expect("create child");
        let child_b = recorder.create(Some(SourceId::new(2)), Some(parent.id), serde_json::json!({})).await.expect("create child");

        recorder.finish(child_a.id, RunStatus::Success, 1, 1).await.expect("finish a");
        let mid_rollup = recorder.rollup(parent.id).await.expect("rollup after one child");
        assert_eq!(mid_rollup.status, RunStatus::Queued, "still waiting on child_b");
        assert_eq!(mid_rollup.batch_summary().expect("summary").pending, 1);

        recorder.finish(child_b.id, RunStatus::Success, 1, 1).await.expect("finish b");
        let final_parent = recorder.rollup(parent.id).await.expect("rollup after both");
        assert_eq!(final_parent.status, RunStatus::Success);
        assert_eq!(final_parent.batch_summary().expect("summary").pending, 0);
        assert_eq!(final_parent.events_found, 2);
        assert_eq!(final_parent.pages_crawled, 2);
    }

    #[tokio::test]
    async fn rollup_sums_child_counters_into_the_parent() {
        let recorder = recorder();
        let parent = recorder.create(None, None, serde_json::json!({})).await.expect("create parent");
        let child_a = recorder.create(Some(SourceId::new(1)), Some(parent.id), serde_json::json!({})).await.expect("create child");
        let child_b = recorder.create(Some(SourceId::new(2)), Some(parent.id), serde_json::json!({})).await.expect("create child");

        recorder.finish(child_a.id, RunStatus::Success, 7, 3).await.expect("finish a");
        recorder.finish(child_b.id, RunStatus::Error, 2, 1).await.expect("finish b");

        let parent = recorder.rollup(parent.id).await.expect("rollup");
        assert_eq!(parent.events_found, 9);
        assert_eq!(parent.pages_crawled, 4);
    }

    #[tokio::test]
    async fn rollup_marks_parent_partial_on_mixed_outcomes() {
        let recorder = recorder();
        let parent = recorder.create(None, None, serde_json::json!({})).await.expect("create parent");
        let child_a = recorder.create(Some(SourceId::new(1)), Some(parent.id), serde_json::json!({})).await.expect("create child");
        let child_b = recorder.create(Some(SourceId::new(2)), Some(parent.id), serde_json::json!({})).await.expect("create child");

        recorder.finish(child_a.id, RunStatus::Success, 1, 1).await.expect("finish a");
        recorder.finish(child_b.id, RunStatus::Error, 0, 1).await.expect("finish b");

        let parent = recorder.rollup(parent.id).await.expect("rollup");
        assert_eq!(parent.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn rollup_marks_parent_partial_when_every_child_fails() {
        let recorder = recorder();
        let parent = recorder.create(None, None, serde_json::json!({})).await.expect("create parent");
        let child = recorder.create(Some(SourceId::new(1)), Some(parent.id), serde_json::json!({})).await.expect("create child");
        recorder.finish(child.id, RunStatus::Error, 0, 0).await.expect("finish");

        let parent = recorder.rollup(parent.id).await.expect("rollup");
        assert_eq!(parent.status, RunStatus::Partial);
    }
}
