//! Notion database synchronization.
//!
//! Queries a database through the rate-limited client, transforms records
//! into calendar events and reconciles them against the stored set by the
//! upstream page id. Unlike iCal feeds, calendars sync concurrently; actual
//! network concurrency stays bounded by the client's two-slot gate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::{NotionCalendar, SyncStatus};
use crate::error::{FamCalError, FamCalResult};
use crate::event::NotionEvent;
use crate::notify::{Notifier, RefreshKind, RefreshSignal, SyncEventBus};
use crate::notion::{NotionClient, Page, PropertyValue};
use crate::store::{CalendarStore, EventStore};
use crate::sync::SyncSummary;
use crate::sync::reconcile::{ReconcileCounts, reconcile_notion_events};

/// Extra columns appended to the description as labeled sections.
const DESCRIPTION_COLUMNS: &[&str] = &["recipe", "notes", "ingredients"];

pub struct NotionSynchronizer {
    calendars: Arc<CalendarStore>,
    events: Arc<EventStore>,
    client: Arc<NotionClient>,
    bus: SyncEventBus,
    notifier: Arc<dyn Notifier>,
    status: Mutex<HashMap<String, SyncStatus>>,
}

impl NotionSynchronizer {
    pub fn new(
        calendars: Arc<CalendarStore>,
        events: Arc<EventStore>,
        client: Arc<NotionClient>,
        bus: SyncEventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        NotionSynchronizer {
            calendars,
            events,
            client,
            bus,
            notifier,
            status: Mutex::new(HashMap::new()),
        }
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

    /// Run one full sync pass for a Notion calendar.
    pub async fn sync_calendar(&self, calendar: &NotionCalendar) -> FamCalResult<Vec<NotionEvent>> {
        self.set_status(&calendar.id, SyncStatus::Syncing);

        match self.sync_calendar_inner(calendar).await {
            Ok((events, counts)) => {
                self.set_status(&calendar.id, SyncStatus::Success);
                self.bus.emit(RefreshSignal::calendar(
                    RefreshKind::Notion,
                    &calendar.id,
                    events.len(),
                    true,
                    format!(
                        "Synced {} events ({} new, {} updated, {} unchanged, {} removed)",
                        events.len(),
                        counts.new,
                        counts.updated,
                        counts.unchanged,
                        counts.removed
                    ),
                ));
                self.notifier.notify(
                    "Sync Complete",
                    &format!(
                        "Successfully synced {} events from {}",
                        events.len(),
                        calendar.name
                    ),
                    false,
                );
                Ok(events)
            }
            Err(e) => {
                self.set_status(&calendar.id, SyncStatus::Error);
                self.bus.emit(RefreshSignal::calendar(
                    RefreshKind::Notion,
                    &calendar.id,
                    0,
                    false,
                    e.to_string(),
                ));
                self.notifier.notify(
                    "Sync Failed",
                    &format!("Failed to sync {}: {}", calendar.name, e),
                    true,
                );
                Err(e)
            }
        }
    }

    async fn sync_calendar_inner(
        &self,
        calendar: &NotionCalendar,
    ) -> FamCalResult<(Vec<NotionEvent>, ReconcileCounts)> {
        let token = calendar
            .metadata
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                FamCalError::Config("Notion integration token is required for this calendar".into())
            })?;
        let database_id = calendar
            .metadata
            .database_id
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| FamCalError::Config("Database ID is required for this calendar".into()))?;

        let pages = self.client.query_all(database_id, token, None).await?;

        let now = Utc::now();
        let fresh: Vec<NotionEvent> = pages
            .iter()
            .map(|page| page_to_event(page, calendar, now))
            .collect();

        let stored = self.events.notion_events_for(&calendar.id);
        let (reconciled, counts) = reconcile_notion_events(&stored, fresh, now);
        tracing::info!(
            calendar = %calendar.name,
            new = counts.new,
            updated = counts.updated,
            unchanged = counts.unchanged,
            removed = counts.removed,
            "notion sync complete"
        );

        self.events.save_notion_events(&calendar.id, &reconciled)?;

        let event_count = reconciled.len();
        self.calendars.update_notion(&calendar.id, |c| {
            c.last_sync = Some(now);
            c.event_count = Some(event_count);
        })?;

        Ok((reconciled, counts))
    }

    /// Sync every enabled calendar concurrently, tolerating individual
    /// failures. Network concurrency is still capped by the client gate.
    pub async fn sync_all_calendars(&self) -> SyncSummary {
        let enabled: Vec<NotionCalendar> = self
            .calendars
            .notion_calendars()
            .into_iter()
            .filter(|c| c.enabled)
            .collect();

        let mut summary = SyncSummary {
            total_calendars: enabled.len(),
            ..Default::default()
        };

        let results =
            futures::future::join_all(enabled.iter().map(|c| self.sync_calendar(c))).await;

        for (calendar, result) in enabled.iter().zip(results) {
            match result {
                Ok(_) => summary.synced_count += 1,
                Err(e) => {
                    summary.error_count += 1;
                    tracing::error!(calendar = %calendar.name, error = %e, "notion calendar sync failed");
                }
            }
        }

        self.bus.emit(RefreshSignal::aggregate(
            RefreshKind::All,
            summary.error_count == 0,
            format!(
                "Synced {}/{} Notion calendars",
                summary.synced_count, summary.total_calendars
            ),
        ));

        summary
    }
}

/// Transform one database record into a calendar event.
fn page_to_event(page: &Page, calendar: &NotionCalendar, now: DateTime<Utc>) -> NotionEvent {
    let title = extract_title(page);
    let (date, time) = extract_date_and_time(page, now);
    let description = build_description(page);
    let location = page
        .property_where(|key| key.contains("location"))
        .and_then(|p| p.plain_text())
        .unwrap_or_default();
    let status = page
        .property("status")
        .and_then(|p| p.plain_text())
        .unwrap_or_default();

    NotionEvent {
        id: page.id.clone(),
        title,
        date,
        time,
        description,
        location,
        status,
        calendar_id: calendar.id.clone(),
        calendar_name: calendar.name.clone(),
        color: "#3b82f6".to_string(),
        source_url: page
            .url
            .clone()
            .unwrap_or_else(|| format!("https://notion.so/{}", page.id)),
        scraped_at: now,
    }
}

/// Display title: a "calendar name" property wins (rich text, then select),
/// falling back to the record's title property, else "Untitled".
fn extract_title(page: &Page) -> String {
    if let Some(title) = page
        .property_where(|key| key.contains("calendar") && key.contains("name"))
        .and_then(|p| p.plain_text())
    {
        return title;
    }

    page.properties
        .values()
        .find(|p| matches!(p, PropertyValue::Title { .. }))
        .and_then(|p| p.plain_text())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Parse the first date property. Date-only strings are taken as local
/// calendar dates (no UTC conversion, avoiding off-by-one-day shifts);
/// datetime strings are parsed as written.
fn extract_date_and_time(page: &Page, now: DateTime<Utc>) -> (NaiveDate, String) {
    let start = page
        .properties
        .values()
        .find_map(|p| p.date_value())
        .map(|d| d.start.clone());

    if let Some(start) = start {
        if let Some(date) = parse_notion_date(&start) {
            let time = start
                .split_once('T')
                .and_then(|(_, rest)| rest.get(0..5))
                .map(|t| t.to_string())
                .unwrap_or_else(|| "All day".to_string());
            return (date, time);
        }
    }

    // No usable date property: fall back to the record's creation time.
    let fallback = page
        .created_time
        .as_deref()
        .and_then(parse_notion_date)
        .unwrap_or_else(|| now.date_naive());
    (fallback, "All day".to_string())
}

fn parse_notion_date(value: &str) -> Option<NaiveDate> {
    if value.contains('T') {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.date_naive())
            .ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    }
}

/// Base description plus any recipe/notes/ingredients columns as labeled
/// sections.
fn build_description(page: &Page) -> String {
    let mut description = page
        .property("description")
        .and_then(|p| p.plain_text())
        .unwrap_or_default();

    let mut sections = Vec::new();
    for column in DESCRIPTION_COLUMNS {
        if let Some(value) = page.property(column).and_then(|p| p.plain_text()) {
            let label = format!("{}{}", column[..1].to_uppercase(), &column[1..]);
            sections.push(format!("{}: {}", label, value));
        }
    }

    if !sections.is_empty() {
        if description.is_empty() {
            description = sections.join("\n");
        } else {
            description = format!("{}\n\n{}", description, sections.join("\n"));
        }
    }

    description
}
