// SPDX-License-Identifier: MIT

//! Catalogued scrape targets (C1 data model).

use serde::{Deserialize, Serialize};

crate::define_row_id! {
    /// Unique identifier for a catalogued scrape target.
    pub struct SourceId;
}

/// Whether a [`Source`] is scraped as a website or an Instagram account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Website,
    Instagram,
}

crate::simple_display! {
    SourceType {
        Website => "website",
        Instagram => "instagram",
    }
}

/// A catalogued scrape target.
///
/// Owned by the admin surface: the core never creates, activates, or
/// deletes a `Source` on its own. It only reads `active` before enqueueing
/// a scrape job and reads `module_key` to select a [`ScraperModule`] at
/// dispatch time.
///
/// [`ScraperModule`]: ../../es_adapters/trait.ScraperModule.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// Stable key selecting the `ScraperModule` implementation at dispatch time.
    pub module_key: String,
    pub name: String,
    pub base_url: String,
    pub active: bool,
    /// IANA timezone name, e.g. "America/Vancouver".
    pub default_timezone: String,
    pub rate_limit_per_minute: i32,
    pub source_type: SourceType,
}

crate::builder! {
    pub struct SourceBuilder => Source {
        into {
            name: String = "Example Events",
            base_url: String = "https://example.com",
            module_key: String = "example_com",
            default_timezone: String = "America/Vancouver",
        }
        set {
            id: SourceId = SourceId::new(1),
            active: bool = true,
            rate_limit_per_minute: i32 = 30,
            source_type: SourceType = SourceType::Website,
        }
    }
}
