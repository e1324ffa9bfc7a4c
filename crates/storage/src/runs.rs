// SPDX-License-Identifier: MIT

//! Run repository (C1) — backs the C4 Run Recorder.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_core::{Run, RunId, RunStatus, SourceId};
use sqlx::PgPool;

#[async_trait]
pub trait RunRepo: Send + Sync {
    async fn create(&self, run: &Run) -> Result<Run>;
    async fn get(&self, id: RunId) -> Result<Run>;
    async fn update(&self, run: &Run) -> Result<()>;
    async fn list_children(&self, parent_run_id: RunId) -> Result<Vec<Run>>;
    /// Reverse lookup by the broker job id recorded at `metadata.jobId`,
    /// used by cancellation to go from job id to Run.
    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Run>>;
}

pub struct PgRunRepo {
    pool: PgPool,
}

impl PgRunRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: i64,
    source_id: Option<i64>,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    events_found: i64,
    pages_crawled: i64,
    parent_run_id: Option<i64>,
    metadata: serde_json::Value,
}

impl TryFrom<RunRow> for Run {
    type Error = StorageError;

    fn try_from(row: RunRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "queued" => RunStatus::Queued,
            "running" => RunStatus::Running,
            "success" => RunStatus::Success,
            "partial" => RunStatus::Partial,
            "error" => RunStatus::Error,
            other => {
                return Err(StorageError::Database(sqlx::Error::Decode(
                    format!("unknown run status: {other}").into(),
                )))
            }
        };
        Ok(Run {
            id: RunId::new(row.id),
            source_id: row.source_id.map(SourceId::new),
            status,
            started_at: row.started_at,
            finished_at: row.finished_at,
            events_found: row.events_found,
            pages_crawled: row.pages_crawled,
            parent_run_id: row.parent_run_id.map(RunId::new),
            metadata: row.metadata,
        })
    }
}

#[async_trait]
impl RunRepo for PgRunRepo {
    async fn create(&self, run: &Run) -> Result<Run> {
        let row = sqlx::query_as::<_, RunRow>(
            "INSERT INTO runs (source_id, status, started_at, finished_at, events_found, \
             pages_crawled, parent_run_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(run.source_id.map(SourceId::get))
        .bind(run.status.to_string())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.events_found)
        .bind(run.pages_crawled)
        .bind(run.parent_run_id.map(RunId::get))
        .bind(&run.metadata)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, id: RunId) -> Result<Run> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::RunNotFound(id))?;
        row.try_into()
    }

    async fn update(&self, run: &Run) -> Result<()> {
        sqlx::query(
            "UPDATE runs SET status = $2, started_at = $3, finished_at = $4, events_found = $5, \
             pages_crawled = $6, metadata = $7 WHERE id = $1",
        )
        .bind(run.id.get())
        .bind(run.status.to_string())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.events_found)
        .bind(run.pages_crawled)
        .bind(&run.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_children(&self, parent_run_id: RunId) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            "SELECT * FROM runs WHERE parent_run_id = $1 ORDER BY id",
        )
        .bind(parent_run_id.get())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE metadata->>'jobId' = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}
