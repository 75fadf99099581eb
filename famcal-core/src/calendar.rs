//! Calendar records for the two synced sources.
//!
//! A `CalendarFeed` is an iCal subscription; a `NotionCalendar` is a Notion
//! database connected through an integration token. Both are identified by an
//! id assigned at creation time, stable for the record's lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FamCalError, FamCalResult};

/// An iCal feed subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarFeed {
    pub id: String,
    pub name: String,
    pub url: String,
    pub color: String,
    pub enabled: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_count: Option<usize>,
}

impl CalendarFeed {
    /// Build a new feed, validating name and URL.
    ///
    /// Uniqueness against existing feeds is checked by the store at insert
    /// time; this only enforces the per-record invariants.
    pub fn new(name: &str, url: &str, color: Option<&str>) -> FamCalResult<Self> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() {
            return Err(FamCalError::Config("Calendar name is required".into()));
        }
        if url.is_empty() {
            return Err(FamCalError::Config("Calendar URL is required".into()));
        }

        Ok(CalendarFeed {
            id: format!("ical_{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            url: url.to_string(),
            color: color.unwrap_or(DEFAULT_FEED_COLOR).to_string(),
            enabled: true,
            last_sync: None,
            event_count: Some(0),
        })
    }
}

const DEFAULT_FEED_COLOR: &str = "#3b82f6";

/// Connection details for a Notion database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotionMetadata {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
}

/// A Notion database synced as a calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionCalendar {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub metadata: NotionMetadata,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_count: Option<usize>,
}

impl NotionCalendar {
    pub fn new(name: &str, token: &str, database_id: &str) -> FamCalResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FamCalError::Config("Calendar name is required".into()));
        }

        Ok(NotionCalendar {
            id: format!("notion_{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            enabled: true,
            metadata: NotionMetadata {
                token: Some(token.trim().to_string()),
                database_id: Some(database_id.trim().to_string()),
            },
            last_sync: None,
            event_count: Some(0),
        })
    }
}

/// Transient per-calendar sync state. Never persisted; resets on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// Normalize a name or URL for duplicate detection.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}
