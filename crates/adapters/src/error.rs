// SPDX-License-Identifier: MIT

//! Error type for the external collaborator adapters.

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("no scraper module registered for key {0:?}")]
    UnknownModule(String),

    #[error("scrape failed: {0}")]
    ScrapeFailed(String),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("cancelled before completion")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AdapterError>;
