// SPDX-License-Identifier: MIT

//! Broker job records (C2 data model).

use chrono::{DateTime, Utc};
use es_core::{BrokerJobId, BrokerJobState, QueueName};
use serde::{Deserialize, Serialize};

/// A job as the broker itself sees it: an opaque payload plus scheduling
/// and lifecycle metadata. The broker never interprets `payload` — that's
/// the dispatcher's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerJob {
    pub id: BrokerJobId,
    pub queue: QueueName,
    pub state: BrokerJobState,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
    /// Set when this job was produced by a repeatable registration, so
    /// reconciliation can tie it back to a `repeat_key`.
    pub repeat_key: Option<String>,
    pub attempts_made: u32,
    pub progress: Option<u8>,
    pub failed_reason: Option<String>,
    pub processed_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
}

impl BrokerJob {
    pub fn new_immediate(queue: QueueName, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self::new(BrokerJobId::new(), queue, payload, now, None, BrokerJobState::Waiting)
    }

    pub fn new_delayed(queue: QueueName, payload: serde_json::Value, run_at: DateTime<Utc>) -> Self {
        Self::new(BrokerJobId::new(), queue, payload, run_at, None, BrokerJobState::Delayed)
    }

    /// A job instance produced by a repeatable firing right now (promotion
    /// loop): immediately actionable, tagged with the `repeat_key` it came
    /// from.
    pub fn new_repeatable_instance(
        queue: QueueName,
        payload: serde_json::Value,
        now: DateTime<Utc>,
        repeat_key: impl Into<String>,
    ) -> Self {
        Self::new(BrokerJobId::new(), queue, payload, now, Some(repeat_key.into()), BrokerJobState::Waiting)
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        id: BrokerJobId,
        queue: QueueName,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
        repeat_key: Option<String>,
        state: BrokerJobState,
    ) -> Self {
        Self {
            id,
            queue,
            state,
            payload,
            run_at,
            repeat_key,
            attempts_made: 0,
            progress: None,
            failed_reason: None,
            processed_on: None,
            finished_on: None,
        }
    }
}
