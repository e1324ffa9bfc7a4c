// SPDX-License-Identifier: MIT

//! Cron repeatable-job bookkeeping.
//!
//! The broker itself knows nothing about cron syntax; it stores whatever
//! `next_run_at` the promoter last computed and honors it as a plain
//! timestamp. This module is where the cron expression actually gets
//! evaluated, so the promoter can both register a repeatable and recompute
//! its next fire time after each promotion.

use crate::error::{BrokerError, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

/// A parsed, ready-to-evaluate repeatable-job spec.
pub struct RepeatableSpec {
    schedule: Schedule,
    timezone: Tz,
}

impl RepeatableSpec {
    /// `cron_expr` is the standard 5-field crontab form (minute hour
    /// day-of-month month day-of-week); the `cron` crate wants a leading
    /// seconds field, so a `0` is prepended before parsing.
    pub fn parse(cron_expr: &str, timezone: &str) -> Result<Self> {
        let six_field = format!("0 {cron_expr}");
        let schedule = Schedule::from_str(&six_field)
            .map_err(|source| BrokerError::InvalidCron { cron: cron_expr.to_string(), source })?;
        let timezone: Tz =
            timezone.parse().map_err(|_| BrokerError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self { schedule, timezone })
    }

    /// The first fire time strictly after `after`, converted back to UTC.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule.after(&local).next().map(|dt| dt.with_timezone(&Utc))
    }
}

/// Convenience for the common case of "what's the very first fire time
/// for a schedule created right now". Backdated by a second so a cron
/// expression matching the current minute fires immediately on
/// registration instead of waiting a full period.
pub fn first_fire_after(cron_expr: &str, timezone: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let spec = RepeatableSpec::parse(cron_expr, timezone)?;
    spec.next_after(now - chrono::Duration::seconds(1))
        .ok_or_else(|| BrokerError::NeverFires(cron_expr.to_string()))
}

/// The next occurrence strictly after a repeatable's own previous
/// `next_run_at`. Used to re-arm a repeatable once it fires: baselining
/// off the instant it just fired (rather than wall-clock `now`) keeps a
/// promotion lookahead window from computing the same occurrence twice.
pub fn next_fire_after(cron_expr: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let spec = RepeatableSpec::parse(cron_expr, timezone)?;
    spec.next_after(after).ok_or_else(|| BrokerError::NeverFires(cron_expr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn next_after_advances_by_one_period() {
        let spec = RepeatableSpec::parse("* * * * *", "UTC").expect("valid cron");
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap();
        let next = spec.next_after(now).expect("has a next fire");
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 31, 0).unwrap());
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert!(RepeatableSpec::parse("* * * * *", "Not/AZone").is_err());
    }

    #[test]
    fn invalid_cron_is_an_error() {
        assert!(RepeatableSpec::parse("not a cron", "UTC").is_err());
    }
}
