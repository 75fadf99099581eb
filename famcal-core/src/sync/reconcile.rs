//! Reconciliation of freshly fetched events against the stored set.
//!
//! iCal occurrences have no stable upstream id, so identity is the composite
//! key `(calendar_id, title, date)`. Two same-titled events on the same day
//! therefore collapse onto one key; the last one in feed order wins. Notion
//! records carry a stable page id and are reconciled by it directly.

use std::collections::HashMap;

use crate::event::{EventOccurrence, NotionEvent};

/// Classified result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileCounts {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Composite identity for an iCal occurrence.
pub fn occurrence_key(occ: &EventOccurrence) -> String {
    format!("{}|{}|{}", occ.calendar_id, occ.title, occ.date)
}

/// Merge freshly expanded occurrences with the previously stored set for the
/// same calendar.
///
/// - A fresh occurrence with an unseen key is new.
/// - A matching key with changed description/location/time/organizer is an
///   update: fresh content, but the stored occurrence's id is preserved.
/// - A matching key with identical content keeps the stored copy.
/// - Stored keys absent from the fresh set are dropped (removed upstream).
pub fn reconcile_occurrences(
    stored: &[EventOccurrence],
    fresh: Vec<EventOccurrence>,
) -> (Vec<EventOccurrence>, ReconcileCounts) {
    let mut stored_by_key: HashMap<String, &EventOccurrence> =
        stored.iter().map(|o| (occurrence_key(o), o)).collect();

    let mut counts = ReconcileCounts::default();
    let mut result = Vec::with_capacity(fresh.len());

    for occurrence in fresh {
        let key = occurrence_key(&occurrence);
        match stored_by_key.remove(&key) {
            None => {
                counts.new += 1;
                result.push(occurrence);
            }
            Some(existing) => {
                let changed = existing.description != occurrence.description
                    || existing.location != occurrence.location
                    || existing.time != occurrence.time
                    || existing.organizer != occurrence.organizer;

                if changed {
                    counts.updated += 1;
                    result.push(EventOccurrence {
                        id: existing.id.clone(),
                        ..occurrence
                    });
                } else {
                    counts.unchanged += 1;
                    result.push(existing.clone());
                }
            }
        }
    }

    // Whatever is left in the map disappeared upstream.
    counts.removed = stored_by_key.len();

    (result, counts)
}

/// Reconcile Notion events by their stable upstream page id.
///
/// Updated records get a fresh scrape timestamp; unchanged records keep the
/// stored copy so any local augmentation survives. Records absent from the
/// fresh result set are dropped.
pub fn reconcile_notion_events(
    stored: &[NotionEvent],
    fresh: Vec<NotionEvent>,
    now: chrono::DateTime<chrono::Utc>,
) -> (Vec<NotionEvent>, ReconcileCounts) {
    let mut stored_by_id: HashMap<&str, &NotionEvent> =
        stored.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut counts = ReconcileCounts::default();
    let mut result = Vec::with_capacity(fresh.len());

    for event in fresh {
        match stored_by_id.remove(event.id.as_str()) {
            None => {
                counts.new += 1;
                result.push(event);
            }
            Some(existing) if existing.same_content(&event) => {
                counts.unchanged += 1;
                result.push(existing.clone());
            }
            Some(_) => {
                counts.updated += 1;
                result.push(NotionEvent {
                    scraped_at: now,
                    ..event
                });
            }
        }
    }

    counts.removed = stored_by_id.len();

    (result, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use chrono::{NaiveDate, Utc};

    fn occurrence(title: &str, date: &str, location: &str) -> EventOccurrence {
        EventOccurrence {
            id: EventOccurrence::new_id(),
            title: title.to_string(),
            time: "All day".to_string(),
            location: location.to_string(),
            description: String::new(),
            organizer: "Family".to_string(),
            date: date.parse::<NaiveDate>().unwrap(),
            calendar_id: "ical_a".to_string(),
            calendar_name: "Family".to_string(),
            color: "#3b82f6".to_string(),
            source: EventSource::ICal,
            is_multi_day: false,
        }
    }

    fn notion_event(id: &str, title: &str) -> NotionEvent {
        NotionEvent {
            id: id.to_string(),
            title: title.to_string(),
            date: "2024-05-01".parse().unwrap(),
            time: "All day".to_string(),
            description: String::new(),
            location: String::new(),
            status: String::new(),
            calendar_id: "notion_a".to_string(),
            calendar_name: "Meals".to_string(),
            color: "#3b82f6".to_string(),
            source_url: String::new(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_preserves_stored_id_and_takes_new_content() {
        let stored = vec![occurrence("T", "2024-04-01", "X")];
        let original_id = stored[0].id.clone();

        let (result, counts) =
            reconcile_occurrences(&stored, vec![occurrence("T", "2024-04-01", "Y")]);

        assert_eq!(counts.updated, 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location, "Y");
        assert_eq!(result[0].id, original_id);
    }

    #[test]
    fn test_unchanged_keeps_stored_copy() {
        let stored = vec![occurrence("T", "2024-04-01", "X")];
        let original_id = stored[0].id.clone();

        let (result, counts) =
            reconcile_occurrences(&stored, vec![occurrence("T", "2024-04-01", "X")]);

        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.new, 0);
        assert_eq!(result[0].id, original_id);
    }

    #[test]
    fn test_disappeared_key_counts_as_removed() {
        let stored = vec![
            occurrence("Kept", "2024-04-01", ""),
            occurrence("Gone", "2024-04-02", ""),
        ];

        let (result, counts) =
            reconcile_occurrences(&stored, vec![occurrence("Kept", "2024-04-01", "")]);

        assert_eq!(counts.removed, 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "Kept");
    }

    #[test]
    fn test_notion_absent_id_is_dropped() {
        let stored = vec![notion_event("p1", "Pasta"), notion_event("p2", "Tacos")];

        let (result, counts) =
            reconcile_notion_events(&stored, vec![notion_event("p2", "Tacos")], Utc::now());

        assert_eq!(counts.removed, 1);
        assert!(!result.iter().any(|e| e.id == "p1"));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_notion_changed_record_gets_fresh_timestamp() {
        let mut old = notion_event("p1", "Pasta");
        old.scraped_at = "2024-01-01T00:00:00Z".parse().unwrap();
        let stored = vec![old];

        let now = Utc::now();
        let (result, counts) =
            reconcile_notion_events(&stored, vec![notion_event("p1", "Lasagna")], now);

        assert_eq!(counts.updated, 1);
        assert_eq!(result[0].title, "Lasagna");
        assert_eq!(result[0].scraped_at, now);
    }
}
