// SPDX-License-Identifier: MIT

//! Schedule Promoter (C3) — keeps the broker's repeatable registrations
//! in sync with the active `schedules` rows, and promotes due
//! repeatable/delayed jobs into the waiting queue.

use crate::error::Result;
use es_broker::{JobBroker, RepeatableRecord};
use es_core::{schedule_id_from_broker_job_id, Clock, QueueName, Schedule, ScheduleId};
use es_storage::ScheduleRepo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchedulePromoter<C: Clock> {
    schedules: Arc<dyn ScheduleRepo>,
    broker: Arc<dyn JobBroker>,
    clock: C,
    /// Reentrancy latch for [`SchedulePromoter::sync`]: a sync tick that's
    /// still running when the next one fires is skipped rather than
    /// allowed to overlap.
    sync_in_progress: AtomicBool,
}

impl<C: Clock> SchedulePromoter<C> {
    pub fn new(schedules: Arc<dyn ScheduleRepo>, broker: Arc<dyn JobBroker>, clock: C) -> Self {
        Self { schedules, broker, clock, sync_in_progress: AtomicBool::new(false) }
    }

    /// Register (or re-register) one active schedule's repeatable binding,
    /// baselining its first fire time off right now.
    pub async fn register(&self, schedule: &Schedule) -> Result<()> {
        let next_run_at = es_broker::first_fire_after(&schedule.cron, &schedule.timezone, self.clock.now())?;
        self.upsert(schedule, next_run_at).await
    }

    /// Re-arm a repeatable that just fired, baselining its next
    /// occurrence off the fire time itself rather than wall-clock `now`.
    /// Using `now` here would recompute the same occurrence a promotion
    /// tick already consumed whenever `lookahead > 0`, firing it twice.
    async fn rearm(&self, schedule: &Schedule, fired_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let next_run_at = es_broker::next_fire_after(&schedule.cron, &schedule.timezone, fired_at)?;
        self.upsert(schedule, next_run_at).await
    }

    async fn upsert(&self, schedule: &Schedule, next_run_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let repeat_key = schedule.broker_job_id();
        let payload = serde_json::json!({
            "scheduleId": schedule.id.get(),
            "scheduleType": schedule.schedule_type.to_string(),
        });
        self.broker
            .upsert_repeatable(RepeatableRecord {
                repeat_key: repeat_key.clone(),
                cron: schedule.cron.clone(),
                timezone: schedule.timezone.clone(),
                payload,
                next_run_at,
            })
            .await?;
        self.schedules.set_repeat_key(schedule.id, Some(&repeat_key)).await?;
        Ok(())
    }

    /// Reconciliation loop tick. Idempotent: registers any active schedule
    /// missing a matching repeatable, and removes any repeatable whose
    /// schedule is gone or inactive (orphan cleanup). Returns the number
    /// of schedules (re)registered.
    pub async fn sync(&self) -> Result<usize> {
        if self.sync_in_progress.swap(true, Ordering::SeqCst) {
            warn!("schedule sync already in progress, skipping this tick");
            return Ok(0);
        }
        let result = self.sync_inner().await;
        self.sync_in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn sync_inner(&self) -> Result<usize> {
        let active = self.schedules.list_active().await?;
        let registered = self.broker.list_repeatables().await?;

        let active_keys: std::collections::HashSet<String> =
            active.iter().map(Schedule::broker_job_id).collect();

        let mut registered_count = 0;
        for schedule in &active {
            let needs_registration = !registered.iter().any(|r| r.repeat_key == schedule.broker_job_id());
            if needs_registration {
                self.register(schedule).await?;
                registered_count += 1;
            }
        }

        for record in &registered {
            if active_keys.contains(&record.repeat_key) {
                continue;
            }
            // No active schedule claims this key: either the schedule was
            // deactivated/deleted, or the key never belonged to a schedule
            // at all. Either way it's an orphan; remove it.
            let schedule_id: Option<ScheduleId> = schedule_id_from_broker_job_id(&record.repeat_key);
            info!(repeat_key = %record.repeat_key, ?schedule_id, "removing orphaned repeatable");
            self.broker.remove_repeatable(&record.repeat_key).await?;
        }

        Ok(registered_count)
    }

    /// Promotion loop tick: two independent halves.
    ///
    /// One-off delayed jobs (queued by `triggerScheduleNow` with a future
    /// `run_at`, for instance) move straight from `delayed` to `waiting` via
    /// [`JobBroker::promote_due`]. Repeatables are different: the broker
    /// holds only the *next* fire time, not a pre-existing job, so a due
    /// repeatable gets a fresh job instance enqueued here and its
    /// registration rolled forward to the following occurrence.
    ///
    /// Returns the total number of jobs produced this tick.
    pub async fn promote(&self, lookahead: chrono::Duration, batch_size: usize) -> Result<usize> {
        let now = self.clock.now();
        let mut produced = self.broker.promote_due(now, lookahead, batch_size).await?.len();

        let cutoff = now + lookahead;
        let due_repeatables =
            self.broker.list_repeatables().await?.into_iter().filter(|r| r.next_run_at <= cutoff);

        for record in due_repeatables.take(batch_size) {
            let Some(schedule_id) = schedule_id_from_broker_job_id(&record.repeat_key) else { continue };
            match self.schedules.get(schedule_id).await {
                Ok(schedule) if schedule.active => {
                    self.broker
                        .enqueue_repeatable_instance(QueueName::Schedule, record.payload.clone(), &record.repeat_key)
                        .await?;
                    self.rearm(&schedule, record.next_run_at).await?;
                    produced += 1;
                }
                Ok(_) => {
                    // Deactivated since registration; the next sync tick
                    // will remove the now-orphaned repeatable.
                }
                Err(err) => warn!(%schedule_id, %err, "due repeatable has no matching schedule"),
            }
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_broker::FakeBroker;
    use es_core::{FakeClock, ScheduleBuilder, ScheduleType};
    use es_storage::FakeScheduleRepo;

    fn promoter_with(schedules: Vec<es_core::Schedule>) -> (SchedulePromoter<FakeClock>, Arc<FakeScheduleRepo>, Arc<FakeBroker>) {
        let repo = Arc::new(FakeScheduleRepo::new(schedules));
        let broker = Arc::new(FakeBroker::new());
        let clock = FakeClock::default();
        (SchedulePromoter::new(repo.clone(), broker.clone(), clock), repo, broker)
    }

    #[tokio::test]
    async fn sync_registers_active_schedules() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::Scrape)
            .source_id(es_core::SourceId::new(1))
            .cron("* * * * *")
            .build();
        let (promoter, repo, broker) = promoter_with(vec![schedule]);

        let registered = promoter.sync().await.expect("sync");
        assert_eq!(registered, 1);
        assert_eq!(broker.list_repeatables().await.expect("list").len(), 1);
        let updated = repo.get(ScheduleId::new(1)).await.expect("get");
        assert_eq!(updated.repeat_key.as_deref(), Some("schedule:1"));
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::InstagramScrape)
            .cron("*/5 * * * *")
            .build();
        let (promoter, _repo, broker) = promoter_with(vec![schedule]);

        promoter.sync().await.expect("first sync");
        promoter.sync().await.expect("second sync");
        assert_eq!(broker.list_repeatables().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn sync_removes_orphaned_repeatables() {
        let (promoter, _repo, broker) = promoter_with(vec![]);
        broker
            .upsert_repeatable(RepeatableRecord {
                repeat_key: "schedule:999".to_string(),
                cron: "* * * * *".to_string(),
                timezone: "UTC".to_string(),
                payload: serde_json::json!({}),
                next_run_at: chrono::Utc::now(),
            })
            .await
            .expect("seed orphan");

        promoter.sync().await.expect("sync");
        assert!(broker.list_repeatables().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn promote_fires_due_repeatable_and_rolls_next_run_forward() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::Scrape)
            .source_id(es_core::SourceId::new(1))
            .cron("* * * * *")
            .build();
        let (promoter, _repo, broker) = promoter_with(vec![schedule]);
        promoter.sync().await.expect("sync registers the repeatable");

        let before = broker.list_repeatables().await.expect("list")[0].next_run_at;
        promoter.clock.advance(chrono::Duration::minutes(1));
        let produced = promoter.promote(chrono::Duration::seconds(0), 10).await.expect("promote");

        assert_eq!(produced, 1);
        let after = broker.list_repeatables().await.expect("list")[0].next_run_at;
        assert!(after > before);
    }

    #[tokio::test]
    async fn promote_is_a_noop_when_nothing_is_due() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::Scrape)
            .source_id(es_core::SourceId::new(1))
            .cron("* * * * *")
            .build();
        let (promoter, _repo, _broker) = promoter_with(vec![schedule]);
        promoter.sync().await.expect("sync registers the repeatable");

        let produced = promoter.promote(chrono::Duration::seconds(0), 10).await.expect("promote");
        assert_eq!(produced, 0);
    }

    #[tokio::test]
    async fn promote_with_lookahead_does_not_double_fire_a_repeatable() {
        let schedule = ScheduleBuilder::default()
            .id(ScheduleId::new(1))
            .schedule_type(ScheduleType::Scrape)
            .source_id(es_core::SourceId::new(1))
            .cron("* * * * *")
            .build();
        let (promoter, _repo, broker) = promoter_with(vec![schedule]);
        promoter.sync().await.expect("sync registers the repeatable");

        promoter.clock.advance(chrono::Duration::minutes(1));
        // A lookahead window wide enough to still cover the occurrence the
        // first tick just rolled forward to, if re-arming were (wrongly)
        // baselined off `now` instead of the fired occurrence.
        let lookahead = chrono::Duration::seconds(90);
        let first = promoter.promote(lookahead, 10).await.expect("first promote");
        let second = promoter.promote(lookahead, 10).await.expect("second promote");

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(broker.all_jobs().len(), 1);
    }
}
