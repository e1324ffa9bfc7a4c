// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! es-core: shared domain types for the event-ingestion job-orchestration
//! engine — sources, schedules, runs, cancellation, and broker job state.
//!
//! This crate has no storage or broker dependency of its own; it is the
//! vocabulary `es-storage`, `es-broker`, `es-adapters`, and `es-engine`
//! all build on.

pub mod macros;

pub mod cancel;
pub mod clock;
pub mod id;
pub mod job_state;
pub mod queue_name;
pub mod run;
pub mod schedule;
pub mod source;
pub mod timezone;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cancel::{CancelAction, CancelFlagValue};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{short, BrokerJobId, IdBuf};
pub use job_state::{BrokerJobState, JobStatusState, JobStatusView};
pub use queue_name::QueueName;
#[cfg(any(test, feature = "test-support"))]
pub use run::RunBuilder;
pub use run::{BatchSummary, Run, RunId, RunMetadataKind, RunStatus};
#[cfg(any(test, feature = "test-support"))]
pub use schedule::ScheduleBuilder;
pub use schedule::{schedule_id_from_broker_job_id, Schedule, ScheduleConfigError, ScheduleId, ScheduleType};
#[cfg(any(test, feature = "test-support"))]
pub use source::SourceBuilder;
pub use source::{Source, SourceId, SourceType};
pub use timezone::{parse_or_default as parse_timezone_or_default, DEFAULT_TIMEZONE};
