//! iCal feed synchronization.
//!
//! Fetches a feed (directly, then through an ordered list of CORS relays),
//! parses and expands it into per-day occurrences, reconciles against the
//! stored set and persists the result. Steps run strictly in fetch -> parse
//! -> expand -> reconcile -> persist -> notify order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};

use crate::calendar::{CalendarFeed, SyncStatus};
use crate::error::{FamCalError, FamCalResult};
use crate::event::EventOccurrence;
use crate::fetch_cache::CachedFetcher;
use crate::ics::{is_valid_ical_data, parse_feed};
use crate::notify::{Notifier, RefreshKind, RefreshSignal, SyncEventBus};
use crate::queue::SyncQueueItem;
use crate::recurrence::expand_events;
use crate::store::{CalendarStore, EventStore};
use crate::sync::SyncSummary;
use crate::sync::reconcile::reconcile_occurrences;

/// One CORS relay endpoint wrapping a target URL.
pub struct RelayProxy {
    pub name: String,
    wrap_fn: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl RelayProxy {
    pub fn new(name: &str, wrap_fn: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        RelayProxy {
            name: name.to_string(),
            wrap_fn: Box::new(wrap_fn),
        }
    }

    pub fn wrap(&self, url: &str) -> String {
        (self.wrap_fn)(url)
    }
}

/// Public relays tried in order after a failed direct fetch.
pub fn default_relays() -> Vec<RelayProxy> {
    vec![
        RelayProxy::new("codetabs", |url| {
            let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            format!("https://api.codetabs.com/v1/proxy?quest={}", encoded)
        }),
        RelayProxy::new("cors-anywhere", |url| {
            format!("https://cors-anywhere.herokuapp.com/{}", url)
        }),
        RelayProxy::new("thingproxy", |url| {
            format!("https://thingproxy.freeboard.io/fetch/{}", url)
        }),
        RelayProxy::new("bridged", |url| format!("https://cors.bridged.cc/{}", url)),
    ]
}

const FEED_ACCEPT: &str = "text/calendar, text/plain, */*";

/// Fetch driver: direct request first, then each relay in order, stopping at
/// the first body that passes the iCal validity check.
pub struct FeedFetcher {
    fetcher: Arc<CachedFetcher>,
    relays: Vec<RelayProxy>,
}

impl FeedFetcher {
    pub fn new(fetcher: Arc<CachedFetcher>) -> Self {
        FeedFetcher {
            fetcher,
            relays: default_relays(),
        }
    }

    pub fn with_relays(fetcher: Arc<CachedFetcher>, relays: Vec<RelayProxy>) -> Self {
        FeedFetcher { fetcher, relays }
    }

    pub async fn fetch_feed_data(&self, url: &str) -> FamCalResult<String> {
        match self.attempt(url).await {
            Ok(data) => return Ok(data),
            Err(e) => {
                tracing::debug!(url, error = %e, "direct feed fetch failed, trying relays");
            }
        }

        for relay in &self.relays {
            let wrapped = relay.wrap(url);
            match self.attempt(&wrapped).await {
                Ok(data) => {
                    tracing::debug!(relay = %relay.name, "relay fetch succeeded");
                    return Ok(data);
                }
                Err(e) => {
                    tracing::debug!(relay = %relay.name, error = %e, "relay fetch failed");
                }
            }
        }

        Err(FamCalError::Fetch(
            "All fetch methods failed or returned invalid data. Please check if the iCal URL is publicly accessible and returns valid calendar data."
                .into(),
        ))
    }

    async fn attempt(&self, url: &str) -> FamCalResult<String> {
        let response = self
            .fetcher
            .get_with_headers(url, &[("Accept", FEED_ACCEPT)])
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(FamCalError::Fetch(format!(
                "request failed with status {}",
                response.status
            )));
        }
        if !is_valid_ical_data(&response.body) {
            return Err(FamCalError::Fetch("response is not valid iCal data".into()));
        }

        Ok(response.body)
    }
}

pub struct ICalSynchronizer {
    calendars: Arc<CalendarStore>,
    events: Arc<EventStore>,
    fetcher: FeedFetcher,
    bus: SyncEventBus,
    notifier: Arc<dyn Notifier>,
    status: Mutex<HashMap<String, SyncStatus>>,
    /// Processing year for expansion; the current year in production.
    year: i32,
}

impl ICalSynchronizer {
    pub fn new(
        calendars: Arc<CalendarStore>,
        events: Arc<EventStore>,
        fetcher: FeedFetcher,
        bus: SyncEventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        ICalSynchronizer {
            calendars,
            events,
            fetcher,
            bus,
            notifier,
            status: Mutex::new(HashMap::new()),
            year: Utc::now().year(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn sync_status(&self, calendar_id: &str) -> SyncStatus {
        self.status
            .lock()
            .unwrap()
            .get(calendar_id)
            .copied()
            .unwrap_or_default()
    }

    fn set_status(&self, calendar_id: &str, status: SyncStatus) {
        self.status
            .lock()
            .unwrap()
            .insert(calendar_id.to_string(), status);
    }

    /// Run one full sync pass for a feed.
    pub async fn sync_calendar(&self, feed: &CalendarFeed) -> FamCalResult<Vec<EventOccurrence>> {
        self.set_status(&feed.id, SyncStatus::Syncing);

        match self.sync_calendar_inner(feed).await {
            Ok(occurrences) => {
                self.set_status(&feed.id, SyncStatus::Success);
                let message = format!("Synced {} events", occurrences.len());
                self.bus.emit(RefreshSignal::calendar(
                    RefreshKind::ICal,
                    &feed.id,
                    occurrences.len(),
                    true,
                    message.clone(),
                ));
                self.notifier.notify("Sync Complete", &message, false);
                Ok(occurrences)
            }
            Err(e) => {
                self.set_status(&feed.id, SyncStatus::Error);
                self.bus.emit(RefreshSignal::calendar(
                    RefreshKind::ICal,
                    &feed.id,
                    0,
                    false,
                    e.to_string(),
                ));
                self.notifier.notify(
                    "Sync Failed",
                    &format!("Failed to sync {}: {}", feed.name, e),
                    true,
                );
                Err(e)
            }
        }
    }

    async fn sync_calendar_inner(
        &self,
        feed: &CalendarFeed,
    ) -> FamCalResult<Vec<EventOccurrence>> {
        if feed.url.trim().is_empty() {
            return Err(FamCalError::Config(
                "Calendar does not have a valid URL for syncing.".into(),
            ));
        }

        let raw = self.fetcher.fetch_feed_data(&feed.url).await?;
        self.reconcile_and_persist(feed, &raw)
    }

    /// Parse raw feed text and run the reconcile/persist tail of a sync pass.
    /// Shared between foreground syncs and queued background results.
    fn reconcile_and_persist(
        &self,
        feed: &CalendarFeed,
        raw: &str,
    ) -> FamCalResult<Vec<EventOccurrence>> {
        let feed_events = parse_feed(raw)?;
        let fresh = expand_events(&feed_events, feed, self.year);

        let stored = self.events.ical_events_for(&feed.id);
        let (reconciled, counts) = reconcile_occurrences(&stored, fresh);
        tracing::info!(
            calendar = %feed.name,
            new = counts.new,
            updated = counts.updated,
            unchanged = counts.unchanged,
            removed = counts.removed,
            "calendar sync complete"
        );

        let event_count = reconciled.len();
        self.events.replace_ical_calendar(&feed.id, reconciled)?;

        self.calendars.update_feed(&feed.id, |f| {
            f.last_sync = Some(Utc::now());
            f.event_count = Some(event_count);
        })?;

        Ok(self.events.ical_events_for(&feed.id))
    }

    /// Process one drained background fetch result.
    ///
    /// A feed deleted between enqueue and drain is skipped, not an error.
    pub fn apply_queued(&self, item: &SyncQueueItem) -> FamCalResult<usize> {
        let Some(feed) = self.calendars.find_feed(&item.calendar_id) else {
            tracing::debug!(calendar_id = %item.calendar_id, "queued sync for unknown calendar, skipping");
            return Ok(0);
        };

        let occurrences = self.reconcile_and_persist(&feed, &item.ical_data)?;
        self.calendars.update_feed(&feed.id, |f| {
            f.last_sync = Some(item.sync_time);
        })?;

        self.bus.emit(RefreshSignal::calendar(
            RefreshKind::ICal,
            &feed.id,
            occurrences.len(),
            true,
            "Background sync completed",
        ));

        Ok(occurrences.len())
    }

    /// Foreground fallback batch: enabled feeds synced sequentially,
    /// continuing past individual failures.
    ///
    /// Callers with a running scheduler should prefer its manual trigger so
    /// the batch runs in the background context.
    pub async fn sync_all_calendars(&self) -> SyncSummary {
        let enabled: Vec<CalendarFeed> = self
            .calendars
            .feeds()
            .into_iter()
            .filter(|f| f.enabled)
            .collect();

        let mut summary = SyncSummary {
            total_calendars: enabled.len(),
            ..Default::default()
        };

        for feed in &enabled {
            match self.sync_calendar(feed).await {
                Ok(_) => summary.synced_count += 1,
                Err(e) => {
                    summary.error_count += 1;
                    tracing::error!(calendar = %feed.name, error = %e, "calendar sync failed");
                }
            }
        }

        self.bus.emit(RefreshSignal::aggregate(
            RefreshKind::All,
            summary.error_count == 0,
            format!(
                "Synced {}/{} calendars",
                summary.synced_count, summary.total_calendars
            ),
        ));

        summary
    }
}
