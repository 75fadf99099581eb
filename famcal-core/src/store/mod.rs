//! File-backed storage collaborators.
//!
//! Each store is explicitly constructed with its own path so tests can run
//! against isolated temporary directories.

mod calendars;
mod events;
mod settings;

pub use calendars::CalendarStore;
pub use events::EventStore;
pub use settings::SettingsStore;

use std::path::PathBuf;

use crate::error::{FamCalError, FamCalResult};

/// Default data directory: `<platform data dir>/famcal`.
pub fn default_data_dir() -> FamCalResult<PathBuf> {
    let dir = dirs::data_dir()
        .ok_or_else(|| FamCalError::Config("Could not determine data directory".into()))?
        .join("famcal");
    Ok(dir)
}
