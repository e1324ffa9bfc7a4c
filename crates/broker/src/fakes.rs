// SPDX-License-Identifier: MIT

//! In-memory broker for engine tests, no Redis required.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::error::Result;
use crate::job::BrokerJob;
use crate::queue::{CancelFlagStore, JobBroker, RepeatableRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_core::{BrokerJobId, BrokerJobState, CancelFlagValue, JobStatusState, JobStatusView, QueueName};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct State {
    jobs: HashMap<String, BrokerJob>,
    repeatables: HashMap<String, RepeatableRecord>,
    cancel_flags: HashMap<String, CancelFlagValue>,
    waiting: HashMap<QueueName, VecDeque<String>>,
}

#[derive(Default)]
pub struct FakeBroker {
    state: Mutex<State>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: snapshot every stored job, for asserting on fan-out shape.
    pub fn all_jobs(&self) -> Vec<BrokerJob> {
        self.state.lock().jobs.values().cloned().collect()
    }
}

#[async_trait]
impl CancelFlagStore for FakeBroker {
    async fn get_cancel_flag(&self, job_id: &BrokerJobId) -> Result<Option<CancelFlagValue>> {
        Ok(self.state.lock().cancel_flags.get(job_id.as_str()).copied())
    }

    async fn set_cancel_flag(&self, job_id: &BrokerJobId, value: CancelFlagValue) -> Result<()> {
        self.state.lock().cancel_flags.insert(job_id.as_str().to_string(), value);
        Ok(())
    }

    async fn clear_cancel_flag(&self, job_id: &BrokerJobId) -> Result<()> {
        self.state.lock().cancel_flags.remove(job_id.as_str());
        Ok(())
    }
}

#[async_trait]
impl JobBroker for FakeBroker {
    async fn enqueue_immediate(&self, queue: QueueName, payload: serde_json::Value) -> Result<BrokerJob> {
        let job = BrokerJob::new_immediate(queue, payload, Utc::now());
        let mut state = self.state.lock();
        state.waiting.entry(queue).or_default().push_back(job.id.as_str().to_string());
        state.jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(job)
    }

    async fn enqueue_delayed(&self, queue: QueueName, payload: serde_json::Value, run_at: DateTime<Utc>) -> Result<BrokerJob> {
        let job = BrokerJob::new_delayed(queue, payload, run_at);
        self.state.lock().jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(job)
    }

    async fn enqueue_repeatable_instance(&self, queue: QueueName, payload: serde_json::Value, repeat_key: &str) -> Result<BrokerJob> {
        let job = BrokerJob::new_repeatable_instance(queue, payload, Utc::now(), repeat_key);
        let mut state = self.state.lock();
        state.waiting.entry(queue).or_default().push_back(job.id.as_str().to_string());
        state.jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(job)
    }

    async fn upsert_repeatable(&self, record: RepeatableRecord) -> Result<()> {
        self.state.lock().repeatables.insert(record.repeat_key.clone(), record);
        Ok(())
    }

    async fn remove_repeatable(&self, repeat_key: &str) -> Result<()> {
        self.state.lock().repeatables.remove(repeat_key);
        Ok(())
    }

    async fn list_repeatables(&self) -> Result<Vec<RepeatableRecord>> {
        Ok(self.state.lock().repeatables.values().cloned().collect())
    }

    async fn promote_due(&self, now: DateTime<Utc>, lookahead: chrono::Duration, batch_size: usize) -> Result<Vec<BrokerJob>> {
        let cutoff = now + lookahead;
        let mut state = self.state.lock();
        let due: Vec<String> = state
            .jobs
            .values()
            .filter(|j| j.state == BrokerJobState::Delayed && j.run_at <= cutoff)
            .take(batch_size)
            .map(|j| j.id.as_str().to_string())
            .collect();
        let mut promoted = Vec::with_capacity(due.len());
        for id in due {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.state = BrokerJobState::Waiting;
                promoted.push(job.clone());
                state.waiting.entry(job.queue).or_default().push_back(id);
            }
        }
        Ok(promoted)
    }

    async fn claim_next(&self, queue: QueueName) -> Result<Option<BrokerJobId>> {
        Ok(self
            .state
            .lock()
            .waiting
            .get_mut(&queue)
            .and_then(|q| q.pop_front())
            .map(|id| BrokerJobId::from_string(&id)))
    }

    async fn get_job(&self, id: &BrokerJobId) -> Result<Option<BrokerJob>> {
        Ok(self.state.lock().jobs.get(id.as_str()).cloned())
    }

    async fn get_job_status(&self, id: &BrokerJobId) -> Result<JobStatusView> {
        let state = self.state.lock();
        match state.jobs.get(id.as_str()) {
            Some(job) => Ok(JobStatusView {
                job_id: job.id.to_string(),
                state: JobStatusState::from(job.state),
                progress: job.progress,
                attempts_made: job.attempts_made,
                failed_reason: job.failed_reason.clone(),
                processed_on: job.processed_on,
                finished_on: job.finished_on,
                data: job.payload.clone(),
                cancel_state: state.cancel_flags.get(id.as_str()).copied(),
            }),
            None => Ok(JobStatusView::missing(id.to_string())),
        }
    }

    async fn remove_job(&self, id: &BrokerJobId) -> Result<bool> {
        let mut state = self.state.lock();
        if let Some(job) = state.jobs.get(id.as_str()) {
            let queue = job.queue;
            if let Some(q) = state.waiting.get_mut(&queue) {
                q.retain(|queued| queued != id.as_str());
            }
        }
        Ok(state.jobs.remove(id.as_str()).is_some())
    }

    async fn set_job_state(&self, id: &BrokerJobId, new_state: BrokerJobState) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(job) = state.jobs.get_mut(id.as_str()) {
            job.state = new_state;
            if new_state.is_terminal() {
                job.finished_on = Some(Utc::now());
            }
        }
        Ok(())
    }
}
