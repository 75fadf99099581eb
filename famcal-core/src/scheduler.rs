//! Background sync scheduling.
//!
//! Bridges the application to deferred/periodic execution. Background
//! batches fetch raw feed data and park it in the durable queue; the
//! foreground drain turns queued items into reconciled occurrences. Notion
//! calendars sync fully inside the batch since the client needs no UI
//! access. The scheduler and the foreground communicate only through the
//! queue and the event bus, never through shared mutable state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::notify::{RefreshKind, RefreshSignal, SyncEventBus};
use crate::queue::{SyncQueue, SyncQueueItem};
use crate::store::CalendarStore;
use crate::sync::SyncSummary;
use crate::sync::ical::{FeedFetcher, ICalSynchronizer};
use crate::sync::notion::NotionSynchronizer;

/// Platform minimum for periodic sync granularity.
const MIN_PERIODIC_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub(crate) fn clamped_interval(requested: Duration) -> Duration {
    requested.max(MIN_PERIODIC_INTERVAL)
}

struct SchedulerInner {
    calendars: Arc<CalendarStore>,
    fetcher: FeedFetcher,
    queue: Arc<SyncQueue>,
    notion: Arc<NotionSynchronizer>,
    bus: SyncEventBus,
}

pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(
        calendars: Arc<CalendarStore>,
        fetcher: FeedFetcher,
        queue: Arc<SyncQueue>,
        notion: Arc<NotionSynchronizer>,
        bus: SyncEventBus,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        SyncScheduler {
            inner: Arc::new(SchedulerInner {
                calendars,
                fetcher,
                queue,
                notion,
                bus,
            }),
            shutdown_tx,
            shut_down: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Request one deferred sync attempt. Resolves true when the attempt was
    /// scheduled; never errors.
    pub async fn register_one_shot_sync(&self) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            run_batch(&inner).await;
        });
        self.tasks.lock().await.push(handle);
        true
    }

    /// Request recurring sync attempts at roughly the given interval.
    /// Intervals below one hour are clamped up to the platform minimum.
    /// Resolves false (without error) when the scheduler is shut down.
    pub async fn register_periodic_sync(&self, interval: Duration) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }

        let period = clamped_interval(interval);
        let inner = self.inner.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        run_batch(&inner).await;
                    }
                }
            }
        });
        self.tasks.lock().await.push(handle);
        true
    }

    /// Run a batch immediately and return its summary. Used for the manual
    /// sync action and as the fallback when deferred registration is
    /// unavailable.
    pub async fn trigger_manual_sync(&self) -> SyncSummary {
        run_batch(&self.inner).await
    }

    /// Stop future batches. A batch already in flight runs to completion;
    /// there is no cancellation path for an in-flight feed fetch.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "scheduler task ended abnormally");
                }
            }
        }
    }
}

/// One background batch over every enabled calendar, iCal then Notion.
/// Per-calendar failures are counted and never abort the batch.
async fn run_batch(inner: &SchedulerInner) -> SyncSummary {
    let feeds: Vec<_> = inner
        .calendars
        .feeds()
        .into_iter()
        .filter(|f| f.enabled)
        .collect();
    let notion_calendars: Vec<_> = inner
        .calendars
        .notion_calendars()
        .into_iter()
        .filter(|c| c.enabled)
        .collect();

    let mut summary = SyncSummary {
        total_calendars: feeds.len() + notion_calendars.len(),
        ..Default::default()
    };

    for feed in &feeds {
        let result = if feed.url.trim().is_empty() {
            Err(crate::error::FamCalError::Config(
                "calendar has no URL".into(),
            ))
        } else {
            inner.fetcher.fetch_feed_data(&feed.url).await
        };

        match result {
            Ok(ical_data) => {
                let item = SyncQueueItem {
                    calendar_id: feed.id.clone(),
                    ical_data,
                    sync_time: Utc::now(),
                    is_background_sync: true,
                };
                match inner.queue.enqueue(item).await {
                    Ok(()) => summary.synced_count += 1,
                    Err(e) => {
                        summary.error_count += 1;
                        tracing::error!(calendar = %feed.name, error = %e, "failed to queue feed data");
                    }
                }
            }
            Err(e) => {
                summary.error_count += 1;
                tracing::error!(calendar = %feed.name, error = %e, "background feed fetch failed");
            }
        }
    }

    for calendar in &notion_calendars {
        match inner.notion.sync_calendar(calendar).await {
            Ok(_) => summary.synced_count += 1,
            Err(e) => {
                summary.error_count += 1;
                tracing::error!(calendar = %calendar.name, error = %e, "background notion sync failed");
            }
        }
    }

    inner.bus.emit(RefreshSignal::aggregate(
        RefreshKind::All,
        summary.error_count == 0,
        format!(
            "Background sync: {}/{} calendars",
            summary.synced_count, summary.total_calendars
        ),
    ));
    tracing::info!(
        synced = summary.synced_count,
        errors = summary.error_count,
        total = summary.total_calendars,
        "background sync completed"
    );

    summary
}

/// Foreground drain: consume every queued background fetch result, dispatch
/// one reconciliation per item, then broadcast the outcome.
pub async fn process_sync_queue(
    queue: &SyncQueue,
    ical: &ICalSynchronizer,
    bus: &SyncEventBus,
) -> SyncSummary {
    let items = queue.drain_all().await;

    let mut summary = SyncSummary {
        total_calendars: items.len(),
        ..Default::default()
    };

    for item in &items {
        match ical.apply_queued(item) {
            Ok(_) => summary.synced_count += 1,
            Err(e) => {
                summary.error_count += 1;
                tracing::error!(calendar_id = %item.calendar_id, error = %e, "queued sync item failed");
            }
        }
    }

    if !items.is_empty() {
        bus.emit(RefreshSignal::aggregate(
            RefreshKind::QueueDrained,
            summary.error_count == 0,
            format!(
                "Processed {}/{} queued sync results",
                summary.synced_count, summary.total_calendars
            ),
        ));
    }

    summary
}
