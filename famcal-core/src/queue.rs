//! Durable sync queue.
//!
//! Bridges background-context fetch results to foreground processing. Items
//! are appended to a JSON list on disk by the background batch and drained
//! exactly once by the foreground; the list survives a full process restart
//! between production and consumption. When the primary file cannot be
//! written, items fall back to a key in the settings store so no fetch
//! result is silently dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::FamCalResult;
use crate::store::SettingsStore;

/// Settings-store key used for the fallback queue tier.
pub const QUEUE_FALLBACK_KEY: &str = "calendar_sync_queue";

/// One background fetch result awaiting foreground processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub calendar_id: String,
    pub ical_data: String,
    pub sync_time: DateTime<Utc>,
    pub is_background_sync: bool,
}

pub struct SyncQueue {
    path: PathBuf,
    fallback: Arc<SettingsStore>,
    // Serializes drains so two drains can never observe the same items.
    drain_lock: Mutex<()>,
}

impl SyncQueue {
    pub fn new(path: impl AsRef<Path>, fallback: Arc<SettingsStore>) -> Self {
        SyncQueue {
            path: path.as_ref().to_path_buf(),
            fallback,
            drain_lock: Mutex::new(()),
        }
    }

    /// Append an item to the durable list.
    ///
    /// Safe to call from the background context; needs nothing beyond the
    /// queue itself. Falls back to the settings store when the primary file
    /// cannot be written.
    pub async fn enqueue(&self, item: SyncQueueItem) -> FamCalResult<()> {
        let _guard = self.drain_lock.lock().await;

        let mut items = self.read_primary();
        items.push(item.clone());

        match self.write_primary(&items) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "sync queue file unavailable, using settings fallback");
                let mut fallback_items: Vec<SyncQueueItem> = self
                    .fallback
                    .get_value(QUEUE_FALLBACK_KEY)
                    .await
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                fallback_items.push(item);
                self.fallback
                    .set_value(QUEUE_FALLBACK_KEY, serde_json::to_value(&fallback_items)?)
                    .await
            }
        }
    }

    /// Atomically read and clear the queue, returning the drained items.
    ///
    /// Absent or unparseable content drains to an empty list. A second drain
    /// immediately after the first returns nothing.
    pub async fn drain_all(&self) -> Vec<SyncQueueItem> {
        let _guard = self.drain_lock.lock().await;

        let mut items = self.read_primary();
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(error = %e, "failed to clear sync queue file");
            }
        }

        if let Some(value) = self.fallback.get_value(QUEUE_FALLBACK_KEY).await {
            if let Ok(fallback_items) = serde_json::from_value::<Vec<SyncQueueItem>>(value) {
                items.extend(fallback_items);
            }
            if let Err(e) = self.fallback.remove_value(QUEUE_FALLBACK_KEY).await {
                tracing::warn!(error = %e, "failed to clear sync queue fallback");
            }
        }

        items
    }

    /// Number of queued items without consuming them.
    pub async fn pending(&self) -> usize {
        let _guard = self.drain_lock.lock().await;
        let mut count = self.read_primary().len();
        if let Some(value) = self.fallback.get_value(QUEUE_FALLBACK_KEY).await {
            if let Ok(items) = serde_json::from_value::<Vec<SyncQueueItem>>(value) {
                count += items.len();
            }
        }
        count
    }

    fn read_primary(&self) -> Vec<SyncQueueItem> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "sync queue file unparseable, treating as empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    fn write_primary(&self, items: &[SyncQueueItem]) -> FamCalResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(items)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(calendar_id: &str) -> SyncQueueItem {
        SyncQueueItem {
            calendar_id: calendar_id.to_string(),
            ical_data: "BEGIN:VCALENDAR\nEND:VCALENDAR".to_string(),
            sync_time: Utc::now(),
            is_background_sync: true,
        }
    }

    #[tokio::test]
    async fn test_enqueue_survives_restart_and_drains_once() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("sync_queue.json");
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")));

        {
            let queue = SyncQueue::new(&queue_path, settings.clone());
            queue.enqueue(item("cal-1")).await.unwrap();
        }

        // Simulated restart: a fresh queue over the same path.
        let queue = SyncQueue::new(&queue_path, settings);
        let drained = queue.drain_all().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].calendar_id, "cal-1");
        assert!(drained[0].is_background_sync);

        // Second drain must come up empty.
        assert!(queue.drain_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_queue_file_drains_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("sync_queue.json");
        std::fs::write(&queue_path, "][ not json").unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")));

        let queue = SyncQueue::new(&queue_path, settings);
        assert!(queue.drain_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_items_are_drained_too() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")));
        settings
            .set_value(QUEUE_FALLBACK_KEY, serde_json::to_value(vec![item("cal-2")]).unwrap())
            .await
            .unwrap();

        let queue = SyncQueue::new(dir.path().join("sync_queue.json"), settings.clone());
        let drained = queue.drain_all().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].calendar_id, "cal-2");

        // Fallback key is cleared after the drain.
        assert!(settings.get_value(QUEUE_FALLBACK_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_multiple_enqueues_preserve_order() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")));
        let queue = SyncQueue::new(dir.path().join("sync_queue.json"), settings);

        queue.enqueue(item("first")).await.unwrap();
        queue.enqueue(item("second")).await.unwrap();

        let drained = queue.drain_all().await;
        let ids: Vec<&str> = drained.iter().map(|i| i.calendar_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
