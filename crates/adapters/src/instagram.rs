// SPDX-License-Identifier: MIT

//! `InstagramWorker`: the per-account scrape collaborator driving the
//! Instagram Batch Coordinator's child runs.

use crate::scraper::ScrapeOutcome;
use crate::Result;
use async_trait::async_trait;
use es_core::Source;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait InstagramWorker: Send + Sync {
    async fn scrape_account(&self, source: &Source, cancel: &CancellationToken) -> Result<ScrapeOutcome>;
}
