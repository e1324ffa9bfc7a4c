// SPDX-License-Identifier: MIT

//! Broker job state vocabulary and the `getJobStatuses` DTO.

use crate::cancel::CancelFlagValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job's lifecycle state as reported by the broker (C2).
///
/// This mirrors the states a Redis-backed queue actually exposes: a job sits
/// in `Waiting` (ready, unclaimed), `Delayed` (future `runAt`), `Active`
/// (claimed by a worker), `Paused` (queue-level pause, not used by any
/// current caller but retained since the broker API surfaces it), and then
/// one of the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerJobState {
    Waiting,
    Delayed,
    Active,
    Paused,
    Completed,
    Failed,
}

crate::simple_display! {
    BrokerJobState {
        Waiting => "waiting",
        Delayed => "delayed",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

impl BrokerJobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BrokerJobState::Completed | BrokerJobState::Failed)
    }
}

/// The extended state union `getJobStatuses` reports per job id.
///
/// Widens [`BrokerJobState`] with two states that only make sense relative
/// to a specific lookup: `Missing` (no such job in the broker at all, as
/// opposed to `Failed`) and `Cancelled` (terminal, but distinct from
/// `Failed` so a dashboard doesn't conflate "we stopped it" with "it broke").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatusState {
    Waiting,
    Delayed,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Missing,
}

crate::simple_display! {
    JobStatusState {
        Waiting => "waiting",
        Delayed => "delayed",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Missing => "missing",
    }
}

impl From<BrokerJobState> for JobStatusState {
    fn from(state: BrokerJobState) -> Self {
        match state {
            BrokerJobState::Waiting => JobStatusState::Waiting,
            BrokerJobState::Delayed => JobStatusState::Delayed,
            BrokerJobState::Active => JobStatusState::Active,
            BrokerJobState::Paused => JobStatusState::Paused,
            BrokerJobState::Completed => JobStatusState::Completed,
            BrokerJobState::Failed => JobStatusState::Failed,
        }
    }
}

/// Per-job DTO returned by `getJobStatuses`.
///
/// `cancel_state` surfaces whatever the cancel-flag key currently holds,
/// independent of `state`: a job can be `Active` with `cancel_state ==
/// Some(Requested)` while a worker is still unwinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub state: JobStatusState,
    /// 0-100, worker-reported; absent until a worker starts reporting it.
    pub progress: Option<u8>,
    pub attempts_made: u32,
    pub failed_reason: Option<String>,
    pub processed_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
    pub data: serde_json::Value,
    pub cancel_state: Option<CancelFlagValue>,
}

impl JobStatusView {
    /// Build the `Missing` view for a job id the broker has no record of.
    pub fn missing(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobStatusState::Missing,
            progress: None,
            attempts_made: 0,
            failed_reason: None,
            processed_on: None,
            finished_on: None,
            data: serde_json::Value::Null,
            cancel_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_state_widens_into_status_state() {
        assert_eq!(JobStatusState::from(BrokerJobState::Active), JobStatusState::Active);
        assert_eq!(JobStatusState::from(BrokerJobState::Failed), JobStatusState::Failed);
    }

    #[test]
    fn missing_view_has_no_timestamps() {
        let view = JobStatusView::missing("job-does-not-exist");
        assert_eq!(view.state, JobStatusState::Missing);
        assert!(view.processed_on.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!BrokerJobState::Waiting.is_terminal());
        assert!(BrokerJobState::Completed.is_terminal());
        assert!(BrokerJobState::Failed.is_terminal());
    }
}
