// SPDX-License-Identifier: MIT

//! Engine-level error type, unifying the three collaborator error types.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] es_storage::StorageError),

    #[error(transparent)]
    Broker(#[from] es_broker::BrokerError),

    #[error(transparent)]
    Adapter(#[from] es_adapters::AdapterError),

    #[error(transparent)]
    InvalidSchedule(#[from] es_core::ScheduleConfigError),

    /// `triggerAllActiveInstagramScrapes` with no active Instagram sources
    /// to fan out to.
    #[error("no active instagram sources to scrape")]
    NoActiveInstagramAccounts,

    #[error("schedule {0} is not active")]
    ScheduleInactive(es_core::ScheduleId),
}

pub type Result<T> = std::result::Result<T, EngineError>;
