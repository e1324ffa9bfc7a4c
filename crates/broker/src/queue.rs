// SPDX-License-Identifier: MIT

//! The job broker trait (C2) and its Redis-backed implementation.
//!
//! Redis layout:
//! - `es:job:{id}` — hash, the serialized [`BrokerJob`]
//! - `es:waiting:{queue}` — one list per named queue, ready for that
//!   queue's worker pool to claim
//! - `es:delayed` — sorted set of job ids scored by `run_at` (unix millis),
//!   shared across queues since promotion is a single time-ordered sweep
//! - `es:repeatables` — hash of `repeat_key` -> serialized [`RepeatableRecord`]
//! - `es:cancel:{job_id}` — string holding a [`CancelFlagValue`], TTLed

use crate::error::{BrokerError, Result};
use crate::job::BrokerJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_core::{BrokerJobId, BrokerJobState, CancelAction, CancelFlagValue, JobStatusState, JobStatusView, QueueName};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// The record the promoter keeps per registered repeatable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatableRecord {
    pub repeat_key: String,
    pub cron: String,
    pub timezone: String,
    /// Opaque payload merged into every job instance this repeatable produces.
    pub payload: serde_json::Value,
    pub next_run_at: DateTime<Utc>,
}

/// Cancel-flag store, shared by `cancelJobs` (C5) and worker poll loops.
#[async_trait]
pub trait CancelFlagStore: Send + Sync {
    async fn get_cancel_flag(&self, job_id: &BrokerJobId) -> Result<Option<CancelFlagValue>>;
    async fn set_cancel_flag(&self, job_id: &BrokerJobId, value: CancelFlagValue) -> Result<()>;

    /// Drop a job's cancel-flag key outright. Called once a job reaches a
    /// terminal state, so a flag from an earlier cancellation attempt
    /// never lingers past the run it was requested against.
    async fn clear_cancel_flag(&self, job_id: &BrokerJobId) -> Result<()>;
}

/// The broker's external surface (C2 contract).
#[async_trait]
pub trait JobBroker: CancelFlagStore {
    async fn enqueue_immediate(&self, queue: QueueName, payload: serde_json::Value) -> Result<BrokerJob>;
    async fn enqueue_delayed(&self, queue: QueueName, payload: serde_json::Value, run_at: DateTime<Utc>) -> Result<BrokerJob>;

    /// Create or update a repeatable registration.
    async fn upsert_repeatable(&self, record: RepeatableRecord) -> Result<()>;
    async fn remove_repeatable(&self, repeat_key: &str) -> Result<()>;
    async fn list_repeatables(&self) -> Result<Vec<RepeatableRecord>>;

    /// Move due one-off delayed jobs into their own queue's waiting list,
    /// returning the jobs promoted this tick.
    async fn promote_due(&self, now: DateTime<Utc>, lookahead: chrono::Duration, batch_size: usize) -> Result<Vec<BrokerJob>>;

    /// Produce and enqueue a job instance for a repeatable that just fired.
    /// The caller is responsible for re-registering the next occurrence via
    /// [`JobBroker::upsert_repeatable`].
    async fn enqueue_repeatable_instance(&self, queue: QueueName, payload: serde_json::Value, repeat_key: &str) -> Result<BrokerJob>;

    /// Pop the next ready job id off one queue's waiting list, if any, for
    /// that queue's worker pool to claim. Does not change the job's state;
    /// the caller transitions it to `Active`.
    async fn claim_next(&self, queue: QueueName) -> Result<Option<BrokerJobId>>;

    async fn get_job(&self, id: &BrokerJobId) -> Result<Option<BrokerJob>>;
    async fn get_job_status(&self, id: &BrokerJobId) -> Result<JobStatusView>;

    /// Remove a not-yet-started job outright (cancellation classification: `Removed`).
    async fn remove_job(&self, id: &BrokerJobId) -> Result<bool>;
    async fn set_job_state(&self, id: &BrokerJobId, state: BrokerJobState) -> Result<()>;
}

fn job_status_view(job: &BrokerJob, cancel_state: Option<CancelFlagValue>) -> JobStatusView {
    JobStatusView {
        job_id: job.id.to_string(),
        state: JobStatusState::from(job.state),
        progress: job.progress,
        attempts_made: job.attempts_made,
        failed_reason: job.failed_reason.clone(),
        processed_on: job.processed_on,
        finished_on: job.finished_on,
        data: job.payload.clone(),
        cancel_state,
    }
}

pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn job_key(id: &BrokerJobId) -> String {
        format!("es:job:{id}")
    }

    fn cancel_key(id: &BrokerJobId) -> String {
        format!("es:cancel:{id}")
    }

    fn waiting_key(queue: QueueName) -> String {
        format!("es:waiting:{queue}")
    }

    async fn store_job(&self, job: &BrokerJob) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)
            .map_err(|e| BrokerError::MalformedRecord { job_id: job.id.to_string(), reason: e.to_string() })?;
        let _: () = conn.set(Self::job_key(&job.id), payload).await?;
        Ok(())
    }

    async fn load_job(&self, id: &BrokerJobId) -> Result<Option<BrokerJob>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::job_key(id)).await?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| BrokerError::MalformedRecord { job_id: id.to_string(), reason: e.to_string() }),
        }
    }
}

#[async_trait]
impl CancelFlagStore for RedisBroker {
    async fn get_cancel_flag(&self, job_id: &BrokerJobId) -> Result<Option<CancelFlagValue>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::cancel_key(job_id)).await?;
        Ok(raw.and_then(|v| match v.as_str() {
            "requested" => Some(CancelFlagValue::Requested),
            "cancelled" => Some(CancelFlagValue::Cancelled),
            _ => None,
        }))
    }

    async fn set_cancel_flag(&self, job_id: &BrokerJobId, value: CancelFlagValue) -> Result<()> {
        let mut conn = self.conn.clone();
        // One day TTL: long enough to outlive any single run, short enough
        // not to accumulate forever for jobs nobody ever inspects again.
        let _: () = conn.set_ex(Self::cancel_key(job_id), value.to_string(), 86_400).await?;
        Ok(())
    }

    async fn clear_cancel_flag(&self, job_id: &BrokerJobId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::cancel_key(job_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl JobBroker for RedisBroker {
    async fn enqueue_immediate(&self, queue: QueueName, payload: serde_json::Value) -> Result<BrokerJob> {
        let job = BrokerJob::new_immediate(queue, payload, Utc::now());
        self.store_job(&job).await?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(Self::waiting_key(queue), job.id.to_string()).await?;
        Ok(job)
    }

    async fn enqueue_delayed(&self, queue: QueueName, payload: serde_json::Value, run_at: DateTime<Utc>) -> Result<BrokerJob> {
        let job = BrokerJob::new_delayed(queue, payload, run_at);
        self.store_job(&job).await?;
        let mut conn = self.conn.clone();
        let _: () = conn.zadd("es:delayed", job.id.to_string(), run_at.timestamp_millis()).await?;
        Ok(job)
    }

    async fn enqueue_repeatable_instance(&self, queue: QueueName, payload: serde_json::Value, repeat_key: &str) -> Result<BrokerJob> {
        let job = BrokerJob::new_repeatable_instance(queue, payload, Utc::now(), repeat_key);
        self.store_job(&job).await?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(Self::waiting_key(queue), job.id.to_string()).await?;
        Ok(job)
    }

    async fn upsert_repeatable(&self, record: RepeatableRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let encoded = serde_json::to_string(&record)
            .map_err(|e| BrokerError::MalformedRecord { job_id: record.repeat_key.clone(), reason: e.to_string() })?;
        let _: () = conn.hset("es:repeatables", &record.repeat_key, encoded).await?;
        Ok(())
    }

    async fn remove_repeatable(&self, repeat_key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel("es:repeatables", repeat_key).await?;
        Ok(())
    }

    async fn list_repeatables(&self) -> Result<Vec<RepeatableRecord>> {
        let mut conn = self.conn.clone();
        let raw: std::collections::HashMap<String, String> = conn.hgetall("es:repeatables").await?;
        raw.into_values()
            .map(|v| {
                serde_json::from_str(&v)
                    .map_err(|e| BrokerError::MalformedRecord { job_id: "repeatable".to_string(), reason: e.to_string() })
            })
            .collect()
    }

    async fn promote_due(&self, now: DateTime<Utc>, lookahead: chrono::Duration, batch_size: usize) -> Result<Vec<BrokerJob>> {
        let mut conn = self.conn.clone();
        let cutoff = (now + lookahead).timestamp_millis();
        let ids: Vec<String> = conn.zrangebyscore_limit("es:delayed", 0, cutoff, 0, batch_size as isize).await?;
        let mut promoted = Vec::with_capacity(ids.len());
        for id in ids {
            let job_id = BrokerJobId::from_string(&id);
            let _: () = conn.zrem("es:delayed", &id).await?;
            if let Some(mut job) = self.load_job(&job_id).await? {
                job.state = BrokerJobState::Waiting;
                self.store_job(&job).await?;
                let _: () = conn.rpush(Self::waiting_key(job.queue), &id).await?;
                promoted.push(job);
            }
        }
        Ok(promoted)
    }

    async fn claim_next(&self, queue: QueueName) -> Result<Option<BrokerJobId>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn.lpop(Self::waiting_key(queue), None).await?;
        Ok(id.map(|id| BrokerJobId::from_string(&id)))
    }

    async fn get_job(&self, id: &BrokerJobId) -> Result<Option<BrokerJob>> {
        self.load_job(id).await
    }

    async fn get_job_status(&self, id: &BrokerJobId) -> Result<JobStatusView> {
        match self.load_job(id).await? {
            Some(job) => {
                let cancel = self.get_cancel_flag(id).await?;
                Ok(job_status_view(&job, cancel))
            }
            None => Ok(JobStatusView::missing(id.to_string())),
        }
    }

    async fn remove_job(&self, id: &BrokerJobId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let job = self.load_job(id).await?;
        let existed: bool = conn.del::<_, i64>(Self::job_key(id)).await? > 0;
        if let Some(job) = job {
            let _: () = conn.lrem(Self::waiting_key(job.queue), 0, id.to_string()).await?;
        }
        let _: () = conn.zrem("es:delayed", id.to_string()).await?;
        Ok(existed)
    }

    async fn set_job_state(&self, id: &BrokerJobId, state: BrokerJobState) -> Result<()> {
        if let Some(mut job) = self.load_job(id).await? {
            job.state = state;
            if state.is_terminal() {
                job.finished_on = Some(Utc::now());
            }
            self.store_job(&job).await?;
        }
        Ok(())
    }
}

/// Classify and act on a single cancellation request against `job_id`.
/// Implemented against the trait rather than as an inherent method so both
/// the Redis and fake brokers share it.
pub async fn cancel_one(broker: &(dyn JobBroker + Sync), job_id: &BrokerJobId) -> Result<CancelAction> {
    let Some(job) = broker.get_job(job_id).await? else {
        broker.set_cancel_flag(job_id, CancelFlagValue::Cancelled).await?;
        return Ok(CancelAction::Missing);
    };
    if job.state.is_terminal() {
        broker.clear_cancel_flag(job_id).await?;
        return Ok(CancelAction::AlreadyFinished);
    }
    if job.state == BrokerJobState::Waiting || job.state == BrokerJobState::Delayed || job.state == BrokerJobState::Paused {
        broker.remove_job(job_id).await?;
        broker.set_cancel_flag(job_id, CancelFlagValue::Cancelled).await?;
        return Ok(CancelAction::Removed);
    }
    broker.set_cancel_flag(job_id, CancelFlagValue::Requested).await?;
    Ok(CancelAction::CancelRequested)
}
