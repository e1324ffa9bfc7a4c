// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! es-storage: the Postgres-backed relational store (C1) — sources,
//! schedules, and runs, plus the schema migrations that define them.

pub mod error;
pub mod pool;
pub mod runs;
pub mod schedules;
pub mod sources;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use error::{Result, StorageError};
pub use pool::connect_and_migrate;
pub use runs::{PgRunRepo, RunRepo};
pub use schedules::{PgScheduleRepo, ScheduleRepo};
pub use sources::{PgSourceRepo, SourceRepo};

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeRunRepo, FakeScheduleRepo, FakeSourceRepo};
