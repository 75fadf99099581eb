//! Persisted event storage.
//!
//! iCal occurrences live in one shared JSON array (replace-by-calendar-id
//! semantics, matching how the synchronizer merges calendars); Notion events
//! live in one file per calendar id. Each synchronizer only ever writes
//! events under its own source's calendar ids.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::FamCalResult;
use crate::event::{EventOccurrence, NotionEvent};

pub struct EventStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl EventStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        EventStore {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // iCal occurrences
    // =========================================================================

    pub fn ical_events(&self) -> Vec<EventOccurrence> {
        read_json_or_empty(&self.ical_path())
    }

    pub fn ical_events_for(&self, calendar_id: &str) -> Vec<EventOccurrence> {
        self.ical_events()
            .into_iter()
            .filter(|e| e.calendar_id == calendar_id)
            .collect()
    }

    /// Replace one calendar's occurrences, leaving other calendars untouched.
    pub fn replace_ical_calendar(
        &self,
        calendar_id: &str,
        events: Vec<EventOccurrence>,
    ) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut all: Vec<EventOccurrence> = self
            .ical_events()
            .into_iter()
            .filter(|e| e.calendar_id != calendar_id)
            .collect();
        all.extend(events);
        self.write_json(&self.ical_path(), &all)
    }

    pub fn remove_ical_calendar(&self, calendar_id: &str) -> FamCalResult<()> {
        self.replace_ical_calendar(calendar_id, Vec::new())
    }

    // =========================================================================
    // Notion events
    // =========================================================================

    pub fn notion_events_for(&self, calendar_id: &str) -> Vec<NotionEvent> {
        read_json_or_empty(&self.notion_path(calendar_id))
    }

    pub fn save_notion_events(
        &self,
        calendar_id: &str,
        events: &[NotionEvent],
    ) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.write_json(&self.notion_path(calendar_id), events)
    }

    pub fn remove_notion_calendar(&self, calendar_id: &str) -> FamCalResult<()> {
        let path = self.notion_path(calendar_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn ical_path(&self) -> PathBuf {
        self.dir.join("ical_events.json")
    }

    fn notion_path(&self, calendar_id: &str) -> PathBuf {
        self.dir.join("notion_events").join(format!("{}.json", calendar_id))
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, path: &Path, value: &T) -> FamCalResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
        Ok(())
    }
}

/// Absent or malformed event files load as empty rather than failing.
fn read_json_or_empty<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "event file unreadable, treating as empty");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}
