// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! es-engine: the orchestration layer tying storage (C1), broker (C2), and
//! the external collaborator adapters together — the Schedule Promoter
//! (C3), the Run Recorder and Instagram Batch Coordinator (C4), the
//! Cancellation Service (C5), the schedule-queue Dispatcher, and the
//! scrape/Instagram queue workers that actually drive adapters.

pub mod api;
pub mod cancellation;
pub mod dispatcher;
pub mod error;
pub mod instagram;
pub mod promoter;
pub mod recorder;
pub mod worker;

pub use api::EngineApi;
pub use cancellation::CancellationService;
pub use dispatcher::Dispatcher;
pub use error::{EngineError, Result};
pub use instagram::InstagramBatchCoordinator;
pub use promoter::SchedulePromoter;
pub use recorder::RunRecorder;
pub use worker::{InstagramAccountWorker, ScrapeWorker};
