// SPDX-License-Identifier: MIT

//! Run: one execution record, parent or child (C1 data model).
//!
//! `metadata` is stored as an untyped JSON column so the admin UI and
//! external collaborators can evolve independently of this crate.
//! [`RunMetadataKind`] gives a typed
//! view onto the two reserved keys the core owns (`jobId`, `batch`) plus the
//! `type`-tagged shape the Run Recorder writes on creation; everything else
//! in the JSON object passes through untouched.

use crate::source::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::define_row_id! {
    /// Unique identifier for a Run (parent or child).
    pub struct RunId;
}

/// Run status machine.
///
/// `Queued -> Running -> {Success | Partial | Error}`. All three right-hand
/// states are absorbing; `Partial` also covers cancellation honored
/// mid-flight with some work completed (there is no separate `Cancelled`
/// Run status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Success,
    Partial,
    Error,
}

crate::simple_display! {
    RunStatus {
        Queued => "queued",
        Running => "running",
        Success => "success",
        Partial => "partial",
        Error => "error",
    }
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Partial | RunStatus::Error)
    }
}

/// One execution unit: a parent batch run or a single scrape/export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub source_id: Option<SourceId>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_found: i64,
    pub pages_crawled: i64,
    pub parent_run_id: Option<RunId>,
    pub metadata: Value,
}

/// Rolled-up child counts written to `parent.metadata.batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub pending: i64,
}

/// Typed views onto `Run.metadata`, tagged by the reserved `type` key.
///
/// These are written once at Run creation time and read back by the
/// dispatcher/coordinator; unknown `type` values (or no `type` key at all,
/// e.g. admin-UI-authored metadata on plain scrape runs) simply don't match
/// any variant here and are left as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunMetadataKind {
    InstagramBatch {
        #[serde(rename = "accountsTotal")]
        accounts_total: u32,
        #[serde(default)]
        options: Value,
    },
    InstagramAccount {
        #[serde(rename = "instagramAccountId")]
        instagram_account_id: i64,
        #[serde(rename = "instagramUsername")]
        instagram_username: String,
        #[serde(rename = "queuePosition")]
        queue_position: u32,
    },
}

impl Run {
    /// Read back the `jobId` reserved key, if the broker has assigned one yet.
    pub fn job_id(&self) -> Option<&str> {
        self.metadata.get("jobId").and_then(Value::as_str)
    }

    /// Merge `{ jobId: ... }` into metadata.
    pub fn set_job_id(&mut self, job_id: &str) {
        merge_key(&mut self.metadata, "jobId", Value::String(job_id.to_string()));
    }

    /// Read back the `batch` reserved key written by rollup.
    pub fn batch_summary(&self) -> Option<BatchSummary> {
        self.metadata
            .get("batch")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Merge `{ batch: ... }` into metadata.
    pub fn set_batch_summary(&mut self, summary: BatchSummary) {
        let value = serde_json::to_value(summary).unwrap_or(Value::Null);
        merge_key(&mut self.metadata, "batch", value);
    }

    /// Decode the typed view of this Run's metadata, if it matches one.
    pub fn metadata_kind(&self) -> Option<RunMetadataKind> {
        serde_json::from_value(self.metadata.clone()).ok()
    }

    /// True once broker cancellation has flagged this run.
    pub fn cancel_requested(&self) -> bool {
        self.metadata.get("cancelRequested").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn set_cancel_requested(&mut self) {
        merge_key(&mut self.metadata, "cancelRequested", Value::Bool(true));
    }
}

/// Merge a single reserved top-level key into a metadata object, treating
/// all other keys as opaque pass-through.
fn merge_key(metadata: &mut Value, key: &str, value: Value) {
    if !metadata.is_object() {
        *metadata = Value::Object(Map::new());
    }
    if let Value::Object(map) = metadata {
        map.insert(key.to_string(), value);
    }
}

crate::builder! {
    pub struct RunBuilder => Run {
        set {
            id: RunId = RunId::new(1),
            status: RunStatus = RunStatus::Queued,
            events_found: i64 = 0,
            pages_crawled: i64 = 0,
            metadata: Value = Value::Object(Map::new()),
        }
        option {
            source_id: SourceId = None,
            parent_run_id: RunId = None,
            started_at: DateTime<Utc> = None,
            finished_at: DateTime<Utc> = None,
        }
    }
}
