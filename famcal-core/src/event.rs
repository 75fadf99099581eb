//! Source-agnostic event occurrences.
//!
//! An occurrence is one concrete calendar day of a source event. Multi-day
//! and recurring events expand into one occurrence per covered day, so each
//! day is independently addressable and independently comparable during
//! reconciliation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which synchronizer produced an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    ICal,
    Notion,
    Local,
}

/// One calendar-day instance of a source event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub id: String,
    pub title: String,
    /// Display string, e.g. "09:00 - 10:30", or "All day".
    pub time: String,
    pub location: String,
    pub description: String,
    /// Organizer display name (the feed name for iCal occurrences).
    pub organizer: String,
    pub date: NaiveDate,
    pub calendar_id: String,
    pub calendar_name: String,
    pub color: String,
    pub source: EventSource,
    pub is_multi_day: bool,
}

impl EventOccurrence {
    pub fn new_id() -> String {
        format!("occ-{}", uuid::Uuid::new_v4())
    }
}

/// An event synced from a Notion database.
///
/// Identity is the upstream page id, which is stable across syncs (unlike
/// iCal occurrences, which only have a composite key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionEvent {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    /// "HH:MM" when the date property carries a time, else "All day".
    pub time: String,
    pub description: String,
    pub location: String,
    pub status: String,
    pub calendar_id: String,
    pub calendar_name: String,
    pub color: String,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl NotionEvent {
    /// Content comparison for reconciliation; id and scrape timestamp are
    /// excluded on purpose.
    pub fn same_content(&self, other: &NotionEvent) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.location == other.location
            && self.status == other.status
            && self.time == other.time
            && self.date == other.date
    }
}
