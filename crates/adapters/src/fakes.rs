// SPDX-License-Identifier: MIT

//! Fake collaborators for engine tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::instagram::InstagramWorker;
use crate::scraper::{ScrapeOutcome, ScraperModule};
use crate::wordpress::{ExportOutcome, WordpressExporter};
use crate::{AdapterError, Result};
use async_trait::async_trait;
use es_core::Source;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A scraper/Instagram worker fake that returns a fixed outcome, or an
/// error if configured to fail, and records every call it received.
pub struct FakeScraper {
    outcome: Result<ScrapeOutcome>,
    calls: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn succeeding(outcome: ScrapeOutcome) -> Self {
        Self { outcome: Ok(outcome), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { outcome: Err(AdapterError::ScrapeFailed(message.into())), calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

fn clone_outcome(outcome: &Result<ScrapeOutcome>) -> Result<ScrapeOutcome> {
    match outcome {
        Ok(o) => Ok(*o),
        Err(AdapterError::ScrapeFailed(msg)) => Err(AdapterError::ScrapeFailed(msg.clone())),
        Err(other) => Err(AdapterError::ScrapeFailed(other.to_string())),
    }
}

#[async_trait]
impl ScraperModule for FakeScraper {
    async fn scrape(&self, source: &Source, cancel: &CancellationToken) -> Result<ScrapeOutcome> {
        self.calls.lock().push(source.module_key.clone());
        if cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        clone_outcome(&self.outcome)
    }
}

#[async_trait]
impl InstagramWorker for FakeScraper {
    async fn scrape_account(&self, source: &Source, cancel: &CancellationToken) -> Result<ScrapeOutcome> {
        self.scrape(source, cancel).await
    }
}

pub struct FakeWordpressExporter {
    outcome: Result<ExportOutcome>,
}

impl FakeWordpressExporter {
    pub fn succeeding(outcome: ExportOutcome) -> Self {
        Self { outcome: Ok(outcome) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { outcome: Err(AdapterError::ExportFailed(message.into())) }
    }
}

#[async_trait]
impl WordpressExporter for FakeWordpressExporter {
    async fn export(&self, _wordpress_settings_id: i64) -> Result<ExportOutcome> {
        match &self.outcome {
            Ok(o) => Ok(*o),
            Err(AdapterError::ExportFailed(msg)) => Err(AdapterError::ExportFailed(msg.clone())),
            Err(other) => Err(AdapterError::ExportFailed(other.to_string())),
        }
    }
}
