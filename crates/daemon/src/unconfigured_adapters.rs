// SPDX-License-Identifier: MIT

//! Placeholder collaborator adapters.
//!
//! `ScraperModule`, `InstagramWorker`, and `WordpressExporter` are external
//! collaborators this crate depends on but does not implement — a real
//! deployment registers its own scrape/export modules before starting the
//! dispatcher. These stand-ins let the daemon start and serve
//! `triggerScheduleNow`/`getJobStatuses`/`cancelJobs` even before any real
//! module is wired in; a dispatch against an unregistered module or an
//! unconfigured collaborator fails the run instead of panicking.

use async_trait::async_trait;
use es_adapters::{AdapterError, InstagramWorker, Result, ScrapeOutcome, WordpressExporter};
use es_core::Source;
use tokio_util::sync::CancellationToken;

pub struct UnconfiguredInstagramWorker;

#[async_trait]
impl InstagramWorker for UnconfiguredInstagramWorker {
    async fn scrape_account(&self, _source: &Source, _cancel: &CancellationToken) -> Result<ScrapeOutcome> {
        Err(AdapterError::ScrapeFailed("no instagram worker configured for this deployment".to_string()))
    }
}

pub struct UnconfiguredWordpressExporter;

#[async_trait]
impl WordpressExporter for UnconfiguredWordpressExporter {
    async fn export(&self, _wordpress_settings_id: i64) -> Result<es_adapters::ExportOutcome> {
        Err(AdapterError::ExportFailed("no wordpress exporter configured for this deployment".to_string()))
    }
}
