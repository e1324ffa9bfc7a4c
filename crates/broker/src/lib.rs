// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! es-broker: the Redis-backed job broker (C2) — immediate/delayed
//! enqueueing, cron repeatable registrations, promotion, and cancel flags.

pub mod error;
pub mod job;
pub mod queue;
pub mod repeatable;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use error::{BrokerError, Result};
pub use job::BrokerJob;
pub use queue::{cancel_one, CancelFlagStore, JobBroker, RedisBroker, RepeatableRecord};
pub use repeatable::{first_fire_after, next_fire_after, RepeatableSpec};

#[cfg(any(test, feature = "test-support"))]
pub use fakes::FakeBroker;
