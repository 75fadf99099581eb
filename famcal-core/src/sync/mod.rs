//! Calendar synchronization: fetch, reconcile, persist.

pub mod ical;
pub mod notion;
pub mod reconcile;

use serde::{Deserialize, Serialize};

/// Aggregate result of a batch sync across calendars.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub synced_count: usize,
    pub error_count: usize,
    pub total_calendars: usize,
}
