//! Key-value settings store.
//!
//! A memory tier over a single JSON document on disk. Used for application
//! settings and as the sync queue's fallback target when its primary file is
//! unavailable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::error::FamCalResult;

pub struct SettingsStore {
    path: PathBuf,
    memory: RwLock<Option<HashMap<String, serde_json::Value>>>,
}

impl SettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SettingsStore {
            path: path.as_ref().to_path_buf(),
            memory: RwLock::new(None),
        }
    }

    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        {
            let memory = self.memory.read().await;
            if let Some(map) = memory.as_ref() {
                return map.get(key).cloned();
            }
        }

        let map = self.load_map();
        let value = map.get(key).cloned();
        *self.memory.write().await = Some(map);
        value
    }

    pub async fn set_value(&self, key: &str, value: serde_json::Value) -> FamCalResult<()> {
        let mut memory = self.memory.write().await;
        let mut map = match memory.take() {
            Some(map) => map,
            None => self.load_map(),
        };
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&map)?)?;

        *memory = Some(map);
        Ok(())
    }

    pub async fn remove_value(&self, key: &str) -> FamCalResult<()> {
        let mut memory = self.memory.write().await;
        let mut map = match memory.take() {
            Some(map) => map,
            None => self.load_map(),
        };
        map.remove(key);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&map)?)?;

        *memory = Some(map);
        Ok(())
    }

    /// Absent or malformed settings files load as empty.
    fn load_map(&self) -> HashMap<String, serde_json::Value> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "settings file unreadable, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        store
            .set_value("theme", serde_json::json!("dark"))
            .await
            .unwrap();

        assert_eq!(
            store.get_value("theme").await,
            Some(serde_json::json!("dark"))
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(&path);
        store
            .set_value("interval", serde_json::json!(3600))
            .await
            .unwrap();
        drop(store);

        let reopened = SettingsStore::new(&path);
        assert_eq!(
            reopened.get_value("interval").await,
            Some(serde_json::json!(3600))
        );
    }

    #[tokio::test]
    async fn test_malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(&path);
        assert_eq!(store.get_value("anything").await, None);
    }
}
