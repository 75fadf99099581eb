//! Occurrence expansion for feed events.
//!
//! Expands parsed VEVENTs into per-day occurrences bounded to a single
//! processing year. Recurring events are iterated through the rrule crate
//! with a hard instance cap so a pathological rule can never loop forever;
//! multi-day all-day events emit one occurrence per covered day.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use rrule::RRuleSet;

use crate::calendar::CalendarFeed;
use crate::error::{FamCalError, FamCalResult};
use crate::event::{EventOccurrence, EventSource};
use crate::ics::{EventTime, FeedEvent};

/// Hard cap on recurrence instances per event (one per day of a leap year).
const MAX_OCCURRENCES: u16 = 366;

/// Build an iCalendar-format RRULE string for the rrule crate parser.
fn build_rrule_string(start: &EventTime, rrule: &str, exdates: &[EventTime]) -> String {
    let mut lines = Vec::new();

    // DTSTART - the rrule crate needs a datetime, so all-day dates become midnight UTC
    let dtstart = match start {
        EventTime::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
        EventTime::DateTimeUtc(dt) => format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
        EventTime::DateTimeFloating(dt) => format!("DTSTART:{}Z", dt.format("%Y%m%dT%H%M%S")),
        EventTime::DateTimeZoned { datetime, tzid } => {
            format!("DTSTART;TZID={}:{}", tzid, datetime.format("%Y%m%dT%H%M%S"))
        }
    };
    lines.push(dtstart);

    lines.push(format!("RRULE:{}", rrule));

    for exdate in exdates {
        let exdate_str = match exdate {
            EventTime::Date(d) => format!("EXDATE:{}T000000Z", d.format("%Y%m%d")),
            EventTime::DateTimeUtc(dt) => format!("EXDATE:{}", dt.format("%Y%m%dT%H%M%SZ")),
            EventTime::DateTimeFloating(dt) => format!("EXDATE:{}Z", dt.format("%Y%m%dT%H%M%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                format!("EXDATE;TZID={}:{}", tzid, datetime.format("%Y%m%dT%H%M%S"))
            }
        };
        lines.push(exdate_str);
    }

    lines.join("\n")
}

/// Display label for an occurrence, e.g. "09:00 - 10:30 (Recurring)".
fn time_label(event: &FeedEvent, is_recurring: bool, is_multi_day: bool) -> String {
    let mut label = match event.start.time_of_day() {
        Some(start_time) => {
            let end_time = event
                .end
                .as_ref()
                .and_then(|e| e.time_of_day())
                .unwrap_or(start_time);
            format!(
                "{} - {}",
                start_time.format("%H:%M"),
                end_time.format("%H:%M")
            )
        }
        None if is_multi_day => "All day (Multi-day)".to_string(),
        None => "All day".to_string(),
    };

    if is_recurring {
        label.push_str(" (Recurring)");
    }

    label
}

fn occurrence_for_day(
    event: &FeedEvent,
    feed: &CalendarFeed,
    date: NaiveDate,
    is_recurring: bool,
    is_multi_day: bool,
) -> EventOccurrence {
    EventOccurrence {
        id: EventOccurrence::new_id(),
        title: event.summary.clone(),
        time: time_label(event, is_recurring, is_multi_day),
        location: event.location.clone().unwrap_or_default(),
        description: event.description.clone().unwrap_or_default(),
        organizer: feed.name.clone(),
        date,
        calendar_id: feed.id.clone(),
        calendar_name: feed.name.clone(),
        color: feed.color.clone(),
        source: EventSource::ICal,
        is_multi_day,
    }
}

/// Expand every event of a feed into per-day occurrences for `year`.
///
/// A failure while expanding one event degrades to a best-effort single
/// occurrence for that event instead of failing the whole feed.
pub fn expand_events(events: &[FeedEvent], feed: &CalendarFeed, year: i32) -> Vec<EventOccurrence> {
    let mut occurrences = Vec::new();

    for event in events {
        match expand_event(event, feed, year) {
            Ok(expanded) => occurrences.extend(expanded),
            Err(e) => {
                tracing::warn!(
                    event = %event.summary,
                    error = %e,
                    "event expansion failed, emitting single occurrence"
                );
                let date = event.start.date_naive();
                if date.year() == year {
                    occurrences.push(occurrence_for_day(event, feed, date, false, false));
                }
            }
        }
    }

    occurrences
}

/// Expand a single event into its in-year occurrences.
pub fn expand_event(
    event: &FeedEvent,
    feed: &CalendarFeed,
    year: i32,
) -> FamCalResult<Vec<EventOccurrence>> {
    let year_end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| FamCalError::Sync(format!("invalid year {}", year)))?;

    let mut occurrences = Vec::new();

    if let Some(rrule) = &event.rrule {
        let rrule_str = build_rrule_string(&event.start, rrule, &event.exdates);
        let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
            FamCalError::Sync(format!(
                "Failed to parse RRULE for event '{}': {}",
                event.summary, e
            ))
        })?;

        // Bound iteration to the processing year, inclusive on both ends.
        let tz: rrule::Tz = Utc.into();
        let after = (Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
            - Duration::seconds(1))
        .with_timezone(&tz);
        let before = Utc
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .unwrap()
            .with_timezone(&tz);

        let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);

        let span = event.span_days();
        let multi_day = event.is_multi_day();

        for occ_dt in &result.dates {
            let occ_date = occ_dt.date_naive();
            if occ_date > year_end {
                break;
            }
            if multi_day {
                for offset in 0..span {
                    let day = occ_date + Duration::days(offset);
                    if day.year() == year {
                        occurrences.push(occurrence_for_day(event, feed, day, true, true));
                    }
                }
            } else {
                occurrences.push(occurrence_for_day(event, feed, occ_date, true, false));
            }
        }
    } else if event.is_multi_day() {
        let start = event.start.date_naive();
        for offset in 0..event.span_days() {
            let day = start + Duration::days(offset);
            if day.year() == year {
                occurrences.push(occurrence_for_day(event, feed, day, false, true));
            }
        }
    } else {
        let date = event.start.date_naive();
        if date.year() == year {
            occurrences.push(occurrence_for_day(event, feed, date, false, false));
        }
    }

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::parse_feed;

    fn test_feed() -> CalendarFeed {
        CalendarFeed::new("Family", "https://example.com/family.ics", None).unwrap()
    }

    fn parse_one(ics: &str) -> FeedEvent {
        let events = parse_feed(ics).expect("fixture should parse");
        assert_eq!(events.len(), 1, "fixture should contain one event");
        events.into_iter().next().unwrap()
    }

    #[test]
    fn test_multi_day_event_expands_per_covered_day() {
        // 3 full days, DTEND exclusive
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:trip\nSUMMARY:Trip\nDTSTART;VALUE=DATE:20240301\nDTEND;VALUE=DATE:20240304\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_event(&event, &test_feed(), 2024).unwrap();

        assert_eq!(occurrences.len(), 3);
        let dates: Vec<String> = occurrences.iter().map(|o| o.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
        assert!(occurrences.iter().all(|o| o.is_multi_day));
        assert!(occurrences.iter().all(|o| o.time == "All day (Multi-day)"));
    }

    #[test]
    fn test_unbounded_rrule_is_clipped_to_year_and_terminates() {
        // Daily with no UNTIL/COUNT: must stop at year end, never loop.
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:daily\nSUMMARY:Daily\nDTSTART:20240101T080000Z\nDTEND:20240101T083000Z\nRRULE:FREQ=DAILY\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_event(&event, &test_feed(), 2024).unwrap();

        // 2024 is a leap year: one instance per day, capped at 366.
        assert_eq!(occurrences.len(), 366);
        assert!(occurrences.iter().all(|o| o.date.year() == 2024));
        assert!(occurrences.iter().all(|o| o.time.ends_with("(Recurring)")));
    }

    #[test]
    fn test_out_of_year_single_event_emits_nothing() {
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:old\nSUMMARY:Old\nDTSTART;VALUE=DATE:20230615\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_event(&event, &test_feed(), 2024).unwrap();
        assert!(occurrences.is_empty());
    }

    #[test]
    fn test_weekly_rrule_respects_exdate() {
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:standup\nSUMMARY:Standup\nDTSTART:20240101T100000Z\nDTEND:20240101T101500Z\nRRULE:FREQ=WEEKLY;BYDAY=MO;UNTIL=20240129T110000Z\nEXDATE:20240108T100000Z\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_event(&event, &test_feed(), 2024).unwrap();

        // Mondays Jan 1, 15, 22, 29 (Jan 8 excluded)
        assert_eq!(occurrences.len(), 4);
        assert!(!occurrences.iter().any(|o| o.date.to_string() == "2024-01-08"));
    }

    #[test]
    fn test_broken_rrule_degrades_to_single_occurrence() {
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:bad\nSUMMARY:Bad rule\nDTSTART:20240601T090000Z\nDTEND:20240601T100000Z\nRRULE:FREQ=NONSENSE\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_events(&[event], &test_feed(), 2024);

        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].date.to_string(), "2024-06-01");
        assert!(!occurrences[0].is_multi_day);
    }

    #[test]
    fn test_timed_event_gets_time_range_label() {
        let event = parse_one(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\nUID:t\nSUMMARY:Dentist\nDTSTART:20240115T090000Z\nDTEND:20240115T103000Z\nEND:VEVENT\nEND:VCALENDAR",
        );

        let occurrences = expand_event(&event, &test_feed(), 2024).unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].time, "09:00 - 10:30");
    }
}
