// SPDX-License-Identifier: MIT

//! `ScraperModule`: the per-source scrape collaborator.
//!
//! Selected by `Source.module_key` at dispatch time. The registry is a
//! compile-time map, not a filesystem plugin scan: adding a source with a
//! new scrape target means shipping a new module and registering it
//! here, not dropping a file on disk at runtime.

use crate::error::{AdapterError, Result};
use async_trait::async_trait;
use es_core::Source;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a scrape run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrapeOutcome {
    pub events_found: i64,
    pub pages_crawled: i64,
}

/// A single scrape target implementation.
///
/// `cancel` is checked cooperatively between pages/items; a module that
/// ignores it simply runs to completion instead of honoring cancellation
/// mid-flight.
#[async_trait]
pub trait ScraperModule: Send + Sync {
    async fn scrape(&self, source: &Source, cancel: &CancellationToken) -> Result<ScrapeOutcome>;
}

/// Compile-time registry of scraper modules, keyed by `Source.module_key`.
#[derive(Default)]
pub struct ScraperRegistry {
    modules: HashMap<String, Arc<dyn ScraperModule>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, module_key: impl Into<String>, module: Arc<dyn ScraperModule>) -> Self {
        self.modules.insert(module_key.into(), module);
        self
    }

    pub fn get(&self, module_key: &str) -> Result<Arc<dyn ScraperModule>> {
        self.modules.get(module_key).cloned().ok_or_else(|| AdapterError::UnknownModule(module_key.to_string()))
    }
}
