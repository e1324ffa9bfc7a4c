// SPDX-License-Identifier: MIT

//! In-memory fakes for the repository traits, for use in engine tests that
//! don't need a real Postgres instance.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::error::{Result, StorageError};
use crate::runs::RunRepo;
use crate::schedules::ScheduleRepo;
use crate::sources::SourceRepo;
use async_trait::async_trait;
use es_core::{Run, RunId, Schedule, ScheduleId, Source, SourceId, SourceType};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct FakeSourceRepo {
    sources: Mutex<BTreeMap<i64, Source>>,
}

impl FakeSourceRepo {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let map = sources.into_iter().map(|s| (s.id.get(), s)).collect();
        Self { sources: Mutex::new(map) }
    }

    pub fn insert(&self, source: Source) {
        self.sources.lock().insert(source.id.get(), source);
    }
}

#[async_trait]
impl SourceRepo for FakeSourceRepo {
    async fn get(&self, id: SourceId) -> Result<Source> {
        self.sources.lock().get(&id.get()).cloned().ok_or(StorageError::SourceNotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Source>> {
        Ok(self.sources.lock().values().filter(|s| s.active).cloned().collect())
    }

    async fn list_active_instagram(&self) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .lock()
            .values()
            .filter(|s| s.active && s.source_type == SourceType::Instagram)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeScheduleRepo {
    schedules: Mutex<BTreeMap<i64, Schedule>>,
}

impl FakeScheduleRepo {
    pub fn new(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let map = schedules.into_iter().map(|s| (s.id.get(), s)).collect();
        Self { schedules: Mutex::new(map) }
    }

    pub fn insert(&self, schedule: Schedule) {
        self.schedules.lock().insert(schedule.id.get(), schedule);
    }
}

#[async_trait]
impl ScheduleRepo for FakeScheduleRepo {
    async fn get(&self, id: ScheduleId) -> Result<Schedule> {
        self.schedules.lock().get(&id.get()).cloned().ok_or(StorageError::ScheduleNotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Schedule>> {
        Ok(self.schedules.lock().values().filter(|s| s.active).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Schedule>> {
        Ok(self.schedules.lock().values().cloned().collect())
    }

    async fn set_repeat_key(&self, id: ScheduleId, repeat_key: Option<&str>) -> Result<()> {
        if let Some(schedule) = self.schedules.lock().get_mut(&id.get()) {
            schedule.repeat_key = repeat_key.map(str::to_string);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRunRepo {
    runs: Mutex<BTreeMap<i64, Run>>,
    next_id: Mutex<i64>,
}

impl FakeRunRepo {
    pub fn new() -> Self {
        Self { runs: Mutex::new(BTreeMap::new()), next_id: Mutex::new(1) }
    }
}

#[async_trait]
impl RunRepo for FakeRunRepo {
    async fn create(&self, run: &Run) -> Result<Run> {
        let mut next_id = self.next_id.lock();
        let id = RunId::new(*next_id);
        *next_id += 1;
        let mut stored = run.clone();
        stored.id = id;
        self.runs.lock().insert(id.get(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: RunId) -> Result<Run> {
        self.runs.lock().get(&id.get()).cloned().ok_or(StorageError::RunNotFound(id))
    }

    async fn update(&self, run: &Run) -> Result<()> {
        self.runs.lock().insert(run.id.get(), run.clone());
        Ok(())
    }

    async fn list_children(&self, parent_run_id: RunId) -> Result<Vec<Run>> {
        Ok(self
            .runs
            .lock()
            .values()
            .filter(|r| r.parent_run_id == Some(parent_run_id))
            .cloned()
            .collect())
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Run>> {
        Ok(self.runs.lock().values().find(|r| r.job_id() == Some(job_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_core::Run;

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let repo = FakeRunRepo::new();
        let first = repo.create(&Run::builder().build()).await.expect("create");
        let second = repo.create(&Run::builder().build()).await.expect("create");
        assert_eq!(first.id, RunId::new(1));
        assert_eq!(second.id, RunId::new(2));
    }

    #[tokio::test]
    async fn find_by_job_id_matches_metadata() {
        let repo = FakeRunRepo::new();
        let mut run = Run::builder().build();
        run.set_job_id("job-abc");
        let created = repo.create(&run).await.expect("create");
        let found = repo.find_by_job_id("job-abc").await.expect("query");
        assert_eq!(found.map(|r| r.id), Some(created.id));
        assert!(repo.find_by_job_id("job-missing").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn list_children_filters_by_parent() {
        let repo = FakeRunRepo::new();
        let parent = repo.create(&Run::builder().build()).await.expect("create");
        let mut child = Run::builder().build();
        child.parent_run_id = Some(parent.id);
        repo.create(&child).await.expect("create");
        repo.create(&Run::builder().build()).await.expect("create");

        let children = repo.list_children(parent.id).await.expect("query");
        assert_eq!(children.len(), 1);
    }
}
