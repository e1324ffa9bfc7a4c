// SPDX-License-Identifier: MIT

//! Named broker queues.
//!
//! The broker partitions waiting work into independent named queues so
//! each kind of job gets its own worker pool instead of all competing on
//! a single list: the schedule-queue worker only ever creates Run rows
//! and hands off, while the scrape and Instagram queues each have their
//! own dedicated worker pool that owns the run it claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    Schedule,
    Scrape,
    InstagramScrape,
}

crate::simple_display! {
    QueueName {
        Schedule => "schedule-queue",
        Scrape => "scrape-queue",
        InstagramScrape => "instagram-scrape-queue",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_queue_names() {
        assert_eq!(QueueName::Schedule.to_string(), "schedule-queue");
        assert_eq!(QueueName::Scrape.to_string(), "scrape-queue");
        assert_eq!(QueueName::InstagramScrape.to_string(), "instagram-scrape-queue");
    }
}
