// SPDX-License-Identifier: MIT

//! `WordpressExporter`: the collaborator that pushes events to a WordPress
//! site for `wordpress_export` schedules.

use crate::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOutcome {
    pub events_exported: i64,
}

#[async_trait]
pub trait WordpressExporter: Send + Sync {
    async fn export(&self, wordpress_settings_id: i64) -> Result<ExportOutcome>;
}
