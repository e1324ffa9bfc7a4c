// SPDX-License-Identifier: MIT

//! Error type for the relational store (C1).

use es_core::ScheduleConfigError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("schedule config invariant violated: {0}")]
    InvalidSchedule(#[from] ScheduleConfigError),

    #[error("source {0} not found")]
    SourceNotFound(es_core::SourceId),

    #[error("schedule {0} not found")]
    ScheduleNotFound(es_core::ScheduleId),

    #[error("run {0} not found")]
    RunNotFound(es_core::RunId),
}

pub type Result<T> = std::result::Result<T, StorageError>;
