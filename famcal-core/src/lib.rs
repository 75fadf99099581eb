//! Core sync engine for the famcal family calendar.
//!
//! This crate provides everything the CLI and server share:
//! - `CalendarFeed`/`NotionCalendar` records and the `EventOccurrence` model
//! - the cache-first fetch interceptor and the durable sync queue
//! - iCal and Notion synchronizers plus the background sync scheduler

pub mod calendar;
pub mod error;
pub mod event;
pub mod fetch_cache;
pub mod ics;
pub mod notify;
pub mod notion;
pub mod queue;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod sync;

// Re-export the types most callers need at crate root
pub use calendar::{CalendarFeed, NotionCalendar, NotionMetadata, SyncStatus, normalize_key};
pub use error::{FamCalError, FamCalResult};
pub use event::{EventOccurrence, EventSource, NotionEvent};
pub use fetch_cache::{CACHE_VERSION, CachedFetcher, CachedResponse};
pub use notify::{LogNotifier, Notifier, RefreshKind, RefreshSignal, SyncEventBus};
pub use notion::{NotionApiError, NotionClient, NotionClientConfig, NotionErrorKind};
pub use queue::{SyncQueue, SyncQueueItem};
pub use scheduler::{SyncScheduler, process_sync_queue};
pub use store::{CalendarStore, EventStore, SettingsStore, default_data_dir};
pub use sync::SyncSummary;
pub use sync::ical::{FeedFetcher, ICalSynchronizer, RelayProxy, default_relays};
pub use sync::notion::NotionSynchronizer;
