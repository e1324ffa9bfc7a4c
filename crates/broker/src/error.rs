// SPDX-License-Identifier: MIT

//! Error type for the job broker (C2).

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid cron expression {cron:?}: {source}")]
    InvalidCron { cron: String, #[source] source: cron::error::Error },

    #[error("cron expression {0:?} never fires")]
    NeverFires(String),

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("repeatable {0} not found")]
    RepeatableNotFound(String),

    #[error("malformed job record for {job_id}: {reason}")]
    MalformedRecord { job_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BrokerError>;
