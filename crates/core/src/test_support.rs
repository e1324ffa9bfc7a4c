// SPDX-License-Identifier: MIT

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for core domain enums.
pub mod strategies {
    use crate::run::RunStatus;
    use crate::schedule::ScheduleType;
    use crate::source::SourceType;
    use proptest::prelude::*;

    pub fn arb_run_status() -> impl Strategy<Value = RunStatus> {
        prop_oneof![
            Just(RunStatus::Queued),
            Just(RunStatus::Running),
            Just(RunStatus::Success),
            Just(RunStatus::Partial),
            Just(RunStatus::Error),
        ]
    }

    pub fn arb_schedule_type() -> impl Strategy<Value = ScheduleType> {
        prop_oneof![
            Just(ScheduleType::Scrape),
            Just(ScheduleType::WordpressExport),
            Just(ScheduleType::InstagramScrape),
        ]
    }

    pub fn arb_source_type() -> impl Strategy<Value = SourceType> {
        prop_oneof![Just(SourceType::Website), Just(SourceType::Instagram)]
    }
}
