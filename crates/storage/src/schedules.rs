// SPDX-License-Identifier: MIT

//! Schedule repository (C1).

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use es_core::{Schedule, ScheduleId, ScheduleType};
use sqlx::PgPool;

#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn get(&self, id: ScheduleId) -> Result<Schedule>;
    async fn list_active(&self) -> Result<Vec<Schedule>>;
    async fn list_all(&self) -> Result<Vec<Schedule>>;
    /// Persist the `repeat_key` the promoter bound this schedule to in the
    /// broker.
    async fn set_repeat_key(&self, id: ScheduleId, repeat_key: Option<&str>) -> Result<()>;
}

pub struct PgScheduleRepo {
    pool: PgPool,
}

impl PgScheduleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: i64,
    schedule_type: String,
    source_id: Option<i64>,
    wordpress_settings_id: Option<i64>,
    cron: String,
    timezone: String,
    active: bool,
    config: serde_json::Value,
    repeat_key: Option<String>,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = StorageError;

    fn try_from(row: ScheduleRow) -> Result<Self> {
        let schedule_type = match row.schedule_type.as_str() {
            "scrape" => ScheduleType::Scrape,
            "wordpress_export" => ScheduleType::WordpressExport,
            "instagram_scrape" => ScheduleType::InstagramScrape,
            other => {
                return Err(StorageError::Database(sqlx::Error::Decode(
                    format!("unknown schedule_type: {other}").into(),
                )))
            }
        };
        let schedule = Schedule {
            id: ScheduleId::new(row.id),
            schedule_type,
            source_id: row.source_id.map(es_core::SourceId::new),
            wordpress_settings_id: row.wordpress_settings_id,
            cron: row.cron,
            timezone: row.timezone,
            active: row.active,
            config: row.config,
            repeat_key: row.repeat_key,
        };
        schedule.validate()?;
        Ok(schedule)
    }
}

#[async_trait]
impl ScheduleRepo for PgScheduleRepo {
    async fn get(&self, id: ScheduleId) -> Result<Schedule> {
        let row = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::ScheduleNotFound(id))?;
        row.try_into()
    }

    async fn list_active(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE active ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_all(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_repeat_key(&self, id: ScheduleId, repeat_key: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE schedules SET repeat_key = $2 WHERE id = $1")
            .bind(id.get())
            .bind(repeat_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
