//! Persistent calendar records (iCal feeds and Notion calendars).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarFeed, NotionCalendar, normalize_key};
use crate::error::{FamCalError, FamCalResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CalendarDocument {
    #[serde(default)]
    feeds: Vec<CalendarFeed>,
    #[serde(default)]
    notion: Vec<NotionCalendar>,
}

/// One JSON document holding every configured calendar.
pub struct CalendarStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file.
    write_lock: Mutex<()>,
}

impl CalendarStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        CalendarStore {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn feeds(&self) -> Vec<CalendarFeed> {
        self.load().feeds
    }

    pub fn notion_calendars(&self) -> Vec<NotionCalendar> {
        self.load().notion
    }

    pub fn find_feed(&self, id: &str) -> Option<CalendarFeed> {
        self.load().feeds.into_iter().find(|f| f.id == id)
    }

    pub fn find_notion(&self, id: &str) -> Option<NotionCalendar> {
        self.load().notion.into_iter().find(|c| c.id == id)
    }

    /// Insert a feed, rejecting duplicates by normalized name or URL.
    pub fn add_feed(&self, feed: CalendarFeed) -> FamCalResult<CalendarFeed> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();

        if doc
            .feeds
            .iter()
            .any(|f| normalize_key(&f.name) == normalize_key(&feed.name))
        {
            return Err(FamCalError::Config(
                "A calendar with this name already exists".into(),
            ));
        }
        if doc
            .feeds
            .iter()
            .any(|f| normalize_key(&f.url) == normalize_key(&feed.url))
        {
            return Err(FamCalError::Config(
                "A calendar with this URL already exists".into(),
            ));
        }

        doc.feeds.push(feed.clone());
        self.save(&doc)?;
        Ok(feed)
    }

    pub fn update_feed(
        &self,
        id: &str,
        apply: impl FnOnce(&mut CalendarFeed),
    ) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();
        let feed = doc
            .feeds
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FamCalError::CalendarNotFound(id.to_string()))?;
        apply(feed);
        self.save(&doc)
    }

    pub fn delete_feed(&self, id: &str) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();
        let before = doc.feeds.len();
        doc.feeds.retain(|f| f.id != id);
        if doc.feeds.len() == before {
            return Err(FamCalError::CalendarNotFound(id.to_string()));
        }
        self.save(&doc)
    }

    pub fn add_notion(&self, calendar: NotionCalendar) -> FamCalResult<NotionCalendar> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();

        if doc
            .notion
            .iter()
            .any(|c| normalize_key(&c.name) == normalize_key(&calendar.name))
        {
            return Err(FamCalError::Config(
                "A calendar with this name already exists".into(),
            ));
        }

        doc.notion.push(calendar.clone());
        self.save(&doc)?;
        Ok(calendar)
    }

    pub fn update_notion(
        &self,
        id: &str,
        apply: impl FnOnce(&mut NotionCalendar),
    ) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();
        let calendar = doc
            .notion
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| FamCalError::CalendarNotFound(id.to_string()))?;
        apply(calendar);
        self.save(&doc)
    }

    pub fn delete_notion(&self, id: &str) -> FamCalResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut doc = self.load();
        let before = doc.notion.len();
        doc.notion.retain(|c| c.id != id);
        if doc.notion.len() == before {
            return Err(FamCalError::CalendarNotFound(id.to_string()));
        }
        self.save(&doc)
    }

    fn load(&self) -> CalendarDocument {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "calendar store unreadable, starting empty");
                CalendarDocument::default()
            }),
            Err(_) => CalendarDocument::default(),
        }
    }

    fn save(&self, doc: &CalendarDocument) -> FamCalResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(doc)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CalendarStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CalendarStore::new(dir.path().join("calendars.json"));
        (dir, store)
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (_dir, store) = store();
        store
            .add_feed(CalendarFeed::new("Family", "https://a.example/cal.ics", None).unwrap())
            .unwrap();

        let duplicate =
            CalendarFeed::new("  family ", "https://b.example/cal.ics", None).unwrap();
        let err = store.add_feed(duplicate).unwrap_err();
        assert!(err.to_string().contains("name already exists"));
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let (_dir, store) = store();
        store
            .add_feed(CalendarFeed::new("Family", "https://a.example/cal.ics", None).unwrap())
            .unwrap();

        let duplicate =
            CalendarFeed::new("Other", "HTTPS://A.EXAMPLE/cal.ics", None).unwrap();
        assert!(store.add_feed(duplicate).is_err());
    }

    #[test]
    fn test_update_feed_persists() {
        let (_dir, store) = store();
        let feed = store
            .add_feed(CalendarFeed::new("Family", "https://a.example/cal.ics", None).unwrap())
            .unwrap();

        store
            .update_feed(&feed.id, |f| f.event_count = Some(12))
            .unwrap();

        assert_eq!(store.find_feed(&feed.id).unwrap().event_count, Some(12));
    }

    #[test]
    fn test_delete_missing_feed_errors() {
        let (_dir, store) = store();
        assert!(matches!(
            store.delete_feed("nope"),
            Err(FamCalError::CalendarNotFound(_))
        ));
    }
}
