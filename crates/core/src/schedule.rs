// SPDX-License-Identifier: MIT

//! Cron-keyed recurring trigger definitions (C1 data model).

use crate::source::SourceId;
use serde::{Deserialize, Serialize};

crate::define_row_id! {
    /// Unique identifier for a recurring trigger definition.
    pub struct ScheduleId;
}

/// What kind of job a [`Schedule`] fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Scrape,
    WordpressExport,
    InstagramScrape,
}

crate::simple_display! {
    ScheduleType {
        Scrape => "scrape",
        WordpressExport => "wordpress_export",
        InstagramScrape => "instagram_scrape",
    }
}

/// Violation of the Schedule invariant: exactly one of `source_id` /
/// `wordpress_settings_id` is set, depending on `schedule_type`.
///
/// Mirrors the database's `schedules_config_check` constraint so the same
/// rule is enforced both at the Rust boundary (fast failure, good error
/// messages) and at the storage layer (defense in depth against rows
/// inserted by other means).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleConfigError {
    #[error("scrape schedules require source_id and must not set wordpress_settings_id")]
    Scrape,
    #[error("wordpress_export schedules require wordpress_settings_id and must not set source_id")]
    WordpressExport,
    #[error("instagram_scrape schedules must not set source_id or wordpress_settings_id")]
    InstagramScrape,
}

/// A recurring trigger definition.
///
/// Owned by the admin surface. The promoter (C3) only reads active rows and
/// writes back `repeat_key`; it never creates, edits, or deletes a Schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub schedule_type: ScheduleType,
    pub source_id: Option<SourceId>,
    pub wordpress_settings_id: Option<i64>,
    /// Five-field cron expression (minute hour day-of-month month day-of-week).
    pub cron: String,
    /// IANA timezone name.
    pub timezone: String,
    pub active: bool,
    pub config: serde_json::Value,
    /// Broker-side `repeat_key` bound on last successful registration.
    pub repeat_key: Option<String>,
}

impl Schedule {
    /// Enforce the Schedule invariant.
    pub fn validate(&self) -> Result<(), ScheduleConfigError> {
        match self.schedule_type {
            ScheduleType::Scrape => {
                if self.source_id.is_some() && self.wordpress_settings_id.is_none() {
                    Ok(())
                } else {
                    Err(ScheduleConfigError::Scrape)
                }
            }
            ScheduleType::WordpressExport => {
                if self.wordpress_settings_id.is_some() && self.source_id.is_none() {
                    Ok(())
                } else {
                    Err(ScheduleConfigError::WordpressExport)
                }
            }
            ScheduleType::InstagramScrape => {
                if self.source_id.is_none() && self.wordpress_settings_id.is_none() {
                    Ok(())
                } else {
                    Err(ScheduleConfigError::InstagramScrape)
                }
            }
        }
    }

    /// The deduplication key this Schedule registers under in the broker's
    /// repeatable-job set: `schedule:{id}`.
    pub fn broker_job_id(&self) -> String {
        format!("schedule:{}", self.id)
    }
}

crate::builder! {
    pub struct ScheduleBuilder => Schedule {
        into {
            cron: String = "*/5 * * * *",
            timezone: String = "UTC",
        }
        set {
            id: ScheduleId = ScheduleId::new(1),
            schedule_type: ScheduleType = ScheduleType::Scrape,
            active: bool = true,
            config: serde_json::Value = serde_json::Value::Null,
        }
        option {
            source_id: SourceId = None,
            wordpress_settings_id: i64 = None,
            repeat_key: String = None,
        }
    }
}

/// Parse the `schedule:{id}` form of a broker `jobId` back into a [`ScheduleId`].
///
/// Returns `None` for anything that isn't a well-formed schedule job id,
/// which reconciliation treats as an orphan candidate.
pub fn schedule_id_from_broker_job_id(job_id: &str) -> Option<ScheduleId> {
    job_id
        .strip_prefix("schedule:")
        .and_then(|rest| rest.parse::<i64>().ok())
        .map(ScheduleId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_requires_source_id_only() {
        let s = Schedule::builder()
            .schedule_type(ScheduleType::Scrape)
            .source_id(SourceId::new(7))
            .build();
        assert!(s.validate().is_ok());

        let bad = Schedule::builder().schedule_type(ScheduleType::Scrape).build();
        assert_eq!(bad.validate(), Err(ScheduleConfigError::Scrape));
    }

    #[test]
    fn wordpress_export_requires_settings_id_only() {
        let s = Schedule::builder()
            .schedule_type(ScheduleType::WordpressExport)
            .wordpress_settings_id(3)
            .build();
        assert!(s.validate().is_ok());

        let bad = Schedule::builder()
            .schedule_type(ScheduleType::WordpressExport)
            .source_id(SourceId::new(1))
            .wordpress_settings_id(3)
            .build();
        assert_eq!(bad.validate(), Err(ScheduleConfigError::WordpressExport));
    }

    #[test]
    fn instagram_scrape_requires_neither() {
        let s = Schedule::builder().schedule_type(ScheduleType::InstagramScrape).build();
        assert!(s.validate().is_ok());

        let bad = Schedule::builder()
            .schedule_type(ScheduleType::InstagramScrape)
            .source_id(SourceId::new(1))
            .build();
        assert_eq!(bad.validate(), Err(ScheduleConfigError::InstagramScrape));
    }

    #[test]
    fn broker_job_id_roundtrips() {
        let s = Schedule::builder().id(ScheduleId::new(42)).build();
        let job_id = s.broker_job_id();
        assert_eq!(job_id, "schedule:42");
        assert_eq!(schedule_id_from_broker_job_id(&job_id), Some(ScheduleId::new(42)));
    }

    #[test]
    fn malformed_broker_job_id_is_none() {
        assert_eq!(schedule_id_from_broker_job_id("schedule:deadbeef"), None);
        assert_eq!(schedule_id_from_broker_job_id("not-a-schedule-key"), None);
    }
}
