// SPDX-License-Identifier: MIT

//! End-to-end scenarios wiring the Schedule Promoter (C3), Run Recorder and
//! Instagram Batch Coordinator (C4), Dispatcher, and Cancellation Service
//! (C5) together against the in-memory fakes — no Postgres or Redis needed
//! to run these.

use std::sync::Arc;

use es_adapters::{FakeScraper, FakeWordpressExporter, ScrapeOutcome, ScraperRegistry};
use es_broker::{FakeBroker, JobBroker, RepeatableRecord};
use es_core::{
    BrokerJobId, BrokerJobState, CancelAction, FakeClock, QueueName, RunId, RunMetadataKind, RunStatus,
    ScheduleBuilder, ScheduleConfigError, ScheduleId, ScheduleType, SourceBuilder, SourceId, SourceType,
};
use es_engine::{CancellationService, Dispatcher, InstagramBatchCoordinator, RunRecorder, SchedulePromoter, ScrapeWorker};
use es_storage::{FakeRunRepo, FakeScheduleRepo, FakeSourceRepo, RunRepo, ScheduleRepo};

/// Scenario 1: a single active scrape schedule, one cron tick, one run.
#[tokio::test]
async fn basic_scrape_schedule_produces_exactly_one_run() {
    let source = SourceBuilder::default().id(SourceId::new(1)).module_key("example_com").source_type(SourceType::Website).build();
    let schedule = ScheduleBuilder::default()
        .id(ScheduleId::new(1))
        .schedule_type(ScheduleType::Scrape)
        .source_id(SourceId::new(1))
        .cron("* * * * *")
        .timezone("UTC")
        .build();

    let sources = Arc::new(FakeSourceRepo::new(vec![source]));
    let schedules = Arc::new(FakeScheduleRepo::new(vec![schedule]));
    let runs = Arc::new(FakeRunRepo::new());
    let broker = Arc::new(FakeBroker::new());
    let clock = FakeClock::default();

    let recorder = Arc::new(RunRecorder::new(runs.clone(), clock.clone()));
    let coordinator = Arc::new(InstagramBatchCoordinator::new(sources.clone(), broker.clone(), recorder.clone()));
    let promoter = SchedulePromoter::new(schedules.clone(), broker.clone(), clock.clone());

    promoter.sync().await.expect("sync registers the schedule's repeatable");

    clock.advance(chrono::Duration::minutes(1));
    let produced = promoter.promote(chrono::Duration::seconds(0), 10).await.expect("promote");
    assert_eq!(produced, 1, "exactly one firing is due");

    let wordpress_exporter = Arc::new(FakeWordpressExporter::failing("wordpress exporter unused in this scenario"));
    let dispatcher = Dispatcher::new(schedules, broker.clone(), recorder.clone(), coordinator, wordpress_exporter);

    let job_id = broker.claim_next(QueueName::Schedule).await.expect("claim").expect("one job waiting");
    dispatcher.dispatch(&job_id).await.expect("dispatch enqueues onto scrape-queue");

    let scrapers = Arc::new(
        ScraperRegistry::new().register("example_com", Arc::new(FakeScraper::succeeding(ScrapeOutcome { events_found: 4, pages_crawled: 2 }))),
    );
    let scrape_worker = ScrapeWorker::new(sources, broker.clone(), recorder, scrapers);
    let claimed = scrape_worker.poll_once().await.expect("poll_once");
    assert!(claimed, "the scrape-queue had exactly one job waiting");

    let scrape_job = broker.all_jobs().into_iter().find(|job| job.id != job_id).expect("dispatcher enqueued a scrape job");
    let status = broker.get_job_status(&scrape_job.id).await.expect("status");
    assert_eq!(status.state, es_core::JobStatusState::Completed);

    let run = runs.get(RunId::new(1)).await.expect("the dispatcher created exactly one run");
    assert_eq!(run.source_id, Some(SourceId::new(1)));
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.events_found, 4);
    assert_eq!(run.pages_crawled, 2);
}

/// Scenario 2: triggering all active Instagram accounts fans out one
/// parent and one child per account, each bound to its own broker job.
#[tokio::test]
async fn instagram_trigger_fans_out_one_child_per_active_account() {
    let accounts = vec![
        SourceBuilder::default().id(SourceId::new(1)).source_type(SourceType::Instagram).build(),
        SourceBuilder::default().id(SourceId::new(2)).source_type(SourceType::Instagram).build(),
        SourceBuilder::default().id(SourceId::new(3)).source_type(SourceType::Instagram).build(),
    ];
    let sources = Arc::new(FakeSourceRepo::new(accounts));
    let runs = Arc::new(FakeRunRepo::new());
    let broker = Arc::new(FakeBroker::new());
    let recorder = Arc::new(RunRecorder::new(runs.clone(), FakeClock::default()));
    let coordinator = InstagramBatchCoordinator::new(sources, broker.clone(), recorder);

    let parent = coordinator.trigger_all_active(serde_json::json!({ "postLimit": 10 })).await.expect("trigger");

    match parent.metadata_kind() {
        Some(RunMetadataKind::InstagramBatch { accounts_total, .. }) => assert_eq!(accounts_total, 3),
        other => panic!("expected InstagramBatch metadata, got {other:?}"),
    }
    let summary = parent.batch_summary().expect("rollup wrote the initial batch summary");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.pending, 3);

    let children = runs.list_children(parent.id).await.expect("children");
    assert_eq!(children.len(), 3);
    for child in &children {
        assert_eq!(child.parent_run_id, Some(parent.id));
        assert!(child.job_id().is_some(), "every child is bound to a broker job before rollup runs");
    }

    let mut positions: Vec<u32> = children
        .iter()
        .map(|c| match c.metadata_kind() {
            Some(RunMetadataKind::InstagramAccount { queue_position, .. }) => queue_position,
            other => panic!("expected InstagramAccount metadata, got {other:?}"),
        })
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![0, 1, 2]);

    assert_eq!(broker.all_jobs().len(), 3);
}

/// Scenario 3: cancelling a batch mid-flight. The two children that never
/// started settle immediately; the active one waits for its own
/// checkpoint; the parent only rolls up once all three are terminal.
#[tokio::test]
async fn mid_batch_cancellation_settles_waiting_children_and_flags_the_active_one() {
    let accounts = vec![
        SourceBuilder::default().id(SourceId::new(1)).source_type(SourceType::Instagram).build(),
        SourceBuilder::default().id(SourceId::new(2)).source_type(SourceType::Instagram).build(),
        SourceBuilder::default().id(SourceId::new(3)).source_type(SourceType::Instagram).build(),
    ];
    let sources = Arc::new(FakeSourceRepo::new(accounts));
    let runs = Arc::new(FakeRunRepo::new());
    let broker = Arc::new(FakeBroker::new());
    let recorder = Arc::new(RunRecorder::new(runs.clone(), FakeClock::default()));
    let coordinator = InstagramBatchCoordinator::new(sources, broker.clone(), recorder.clone());

    let parent = coordinator.trigger_all_active(serde_json::json!({})).await.expect("trigger");
    let children = runs.list_children(parent.id).await.expect("children");
    assert_eq!(children.len(), 3);

    let job_ids: Vec<String> = children.iter().map(|c| c.job_id().expect("bound").to_string()).collect();
    let active_job = BrokerJobId::from_string(&job_ids[0]);
    broker.set_job_state(&active_job, BrokerJobState::Active).await.expect("mark the first child active");

    let cancellation = CancellationService::new(broker.clone(), recorder.clone());
    let results = cancellation.cancel_jobs(job_ids).await.expect("cancel");

    assert_eq!(results[0].1, CancelAction::CancelRequested);
    assert_eq!(results[1].1, CancelAction::Removed);
    assert_eq!(results[2].1, CancelAction::Removed);

    let active_child = runs.get(children[0].id).await.expect("reload");
    assert_eq!(active_child.status, RunStatus::Queued, "the active child waits for its own checkpoint");
    assert!(active_child.cancel_requested());

    let waiting_b = runs.get(children[1].id).await.expect("reload");
    let waiting_c = runs.get(children[2].id).await.expect("reload");
    assert_eq!(waiting_b.status, RunStatus::Partial);
    assert_eq!(waiting_c.status, RunStatus::Partial);

    let parent_mid = runs.get(parent.id).await.expect("reload parent");
    assert_eq!(parent_mid.status, RunStatus::Queued, "still waiting on the active child");
    assert_eq!(parent_mid.batch_summary().expect("summary").pending, 1);

    // The active worker observes the cancel flag at its next checkpoint.
    recorder.finish(active_child.id, RunStatus::Partial, 0, 0).await.expect("finish at checkpoint");

    let parent_final = runs.get(parent.id).await.expect("reload parent");
    assert_eq!(parent_final.status, RunStatus::Partial, "a batch with no completed work never rolls up to success");
    assert_eq!(parent_final.batch_summary().expect("summary").pending, 0);
}

/// Scenario 4: a repeatable with no matching Schedule row is an orphan and
/// gets removed on the next reconciliation tick, without creating anything.
#[tokio::test]
async fn reconciliation_removes_orphaned_repeatable() {
    let schedules = Arc::new(FakeScheduleRepo::new(vec![]));
    let broker = Arc::new(FakeBroker::new());
    let promoter = SchedulePromoter::new(schedules.clone(), broker.clone(), FakeClock::default());

    broker
        .upsert_repeatable(RepeatableRecord {
            repeat_key: "schedule:deadbeef".to_string(),
            cron: "* * * * *".to_string(),
            timezone: "UTC".to_string(),
            payload: serde_json::json!({}),
            next_run_at: chrono::Utc::now(),
        })
        .await
        .expect("seed orphan");

    let registered = promoter.sync().await.expect("sync");
    assert_eq!(registered, 0);
    assert!(broker.list_repeatables().await.expect("list").is_empty());
    assert!(schedules.list_all().await.expect("list").is_empty());
}

/// Scenario 5: a promoter that missed several firings while "paused"
/// produces exactly one run on resume, not one per missed occurrence.
#[tokio::test]
async fn promotion_after_downtime_produces_exactly_one_run() {
    let source = SourceBuilder::default().id(SourceId::new(1)).module_key("example_com").build();
    let schedule = ScheduleBuilder::default()
        .id(ScheduleId::new(1))
        .schedule_type(ScheduleType::Scrape)
        .source_id(SourceId::new(1))
        .cron("* * * * *")
        .timezone("UTC")
        .build();
    let schedules = Arc::new(FakeScheduleRepo::new(vec![schedule]));
    let broker = Arc::new(FakeBroker::new());
    let clock = FakeClock::default();
    let promoter = SchedulePromoter::new(schedules, broker.clone(), clock.clone());

    promoter.sync().await.expect("sync");

    // Several minutes pass with nobody calling promote() -- the repeatable
    // has missed more than one firing by the time the loop resumes.
    clock.advance(chrono::Duration::minutes(5));
    let produced = promoter.promote(chrono::Duration::seconds(0), 10).await.expect("promote after downtime");
    assert_eq!(produced, 1, "a repeatable yields at most one instance per tick, however many firings it missed");
    assert_eq!(broker.all_jobs().len(), 1);

    let produced_again = promoter.promote(chrono::Duration::seconds(0), 10).await.expect("promote again immediately");
    assert_eq!(produced_again, 0, "the next occurrence isn't due yet");
}

/// Scenario 6: the Schedule invariant rejects mismatched source/settings
/// ids and accepts the one combination each schedule type actually allows.
#[test]
fn schedule_invariant_rejects_malformed_configs() {
    let bad_export = ScheduleBuilder::default().schedule_type(ScheduleType::WordpressExport).source_id(SourceId::new(1)).build();
    assert_eq!(bad_export.validate(), Err(ScheduleConfigError::WordpressExport));

    let bad_instagram = ScheduleBuilder::default().schedule_type(ScheduleType::InstagramScrape).source_id(SourceId::new(2)).build();
    assert_eq!(bad_instagram.validate(), Err(ScheduleConfigError::InstagramScrape));

    let good_instagram = ScheduleBuilder::default().schedule_type(ScheduleType::InstagramScrape).build();
    assert!(good_instagram.validate().is_ok());
}
