// SPDX-License-Identifier: MIT

//! Source repository (C1).

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use es_core::{Source, SourceId, SourceType};
use sqlx::PgPool;

#[async_trait]
pub trait SourceRepo: Send + Sync {
    async fn get(&self, id: SourceId) -> Result<Source>;
    async fn list_active(&self) -> Result<Vec<Source>>;
    async fn list_active_instagram(&self) -> Result<Vec<Source>>;
}

pub struct PgSourceRepo {
    pool: PgPool,
}

impl PgSourceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i64,
    module_key: String,
    name: String,
    base_url: String,
    active: bool,
    default_timezone: String,
    rate_limit_per_minute: i32,
    source_type: String,
}

impl TryFrom<SourceRow> for Source {
    type Error = StorageError;

    fn try_from(row: SourceRow) -> Result<Self> {
        let source_type = match row.source_type.as_str() {
            "website" => SourceType::Website,
            "instagram" => SourceType::Instagram,
            other => {
                return Err(StorageError::Database(sqlx::Error::Decode(
                    format!("unknown source_type: {other}").into(),
                )))
            }
        };
        Ok(Source {
            id: SourceId::new(row.id),
            module_key: row.module_key,
            name: row.name,
            base_url: row.base_url,
            active: row.active,
            default_timezone: row.default_timezone,
            rate_limit_per_minute: row.rate_limit_per_minute,
            source_type,
        })
    }
}

#[async_trait]
impl SourceRepo for PgSourceRepo {
    async fn get(&self, id: SourceId) -> Result<Source> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::SourceNotFound(id))?;
        row.try_into()
    }

    async fn list_active(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE active ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_active_instagram(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE active AND source_type = 'instagram' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
