// SPDX-License-Identifier: MIT

//! Cancel-flag vocabulary shared between the broker (C2) and the
//! cancellation service (C5).
//!
//! Cancellation is cooperative and out-of-band: the service never kills a
//! worker process. It writes a flag keyed by job id that the worker's own
//! poll loop observes between units of work.

use serde::{Deserialize, Serialize};

/// Value stored under a job's cancel-flag key.
///
/// `Requested` is written first; a worker that observes it mid-run
/// transitions its own flag to `Cancelled` once it has unwound.
/// The two states let an operator distinguish "asked to stop" from
/// "confirmed stopped" when inspecting a run that's taking a while to unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelFlagValue {
    Requested,
    Cancelled,
}

crate::simple_display! {
    CancelFlagValue {
        Requested => "requested",
        Cancelled => "cancelled",
    }
}

/// Outcome of a single cancellation attempt against one job id.
///
/// `cancelJobs` classifies each requested job id independently and returns
/// one of these per id, rather than failing the whole batch on the first
/// problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelAction {
    /// The job hadn't started; it was removed from the broker outright.
    Removed,
    /// The job is active; a cancel flag was written for the worker to observe.
    CancelRequested,
    /// The job had already reached a terminal state; cancellation is a no-op.
    AlreadyFinished,
    /// No job with this id exists in the broker.
    Missing,
}

crate::simple_display! {
    CancelAction {
        Removed => "removed",
        CancelRequested => "cancel_requested",
        AlreadyFinished => "already_finished",
        Missing => "missing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_rename() {
        assert_eq!(CancelFlagValue::Requested.to_string(), "requested");
        assert_eq!(CancelAction::AlreadyFinished.to_string(), "already_finished");
    }
}
