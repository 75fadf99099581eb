//! ICS feed parsing using the icalendar crate's parser.

use icalendar::{
    DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::error::{FamCalError, FamCalResult};
use crate::ics::{EventTime, FeedEvent};

/// Substrings that mark a short response body as an error page rather than
/// calendar data.
const ERROR_INDICATORS: &[&str] = &[
    "offline",
    "error",
    "not found",
    "404",
    "500",
    "503",
    "access denied",
    "forbidden",
    "unauthorized",
    "timeout",
    "maintenance",
    "unavailable",
];

/// Check whether a fetched body looks like real iCal data.
///
/// Proxies tend to return short HTML/plain-text error pages with a 200
/// status; those are rejected so the fetch driver moves on to the next
/// relay.
pub fn is_valid_ical_data(data: &str) -> bool {
    let lower = data.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }

    if data.len() < 50 && ERROR_INDICATORS.iter().any(|i| lower.contains(i)) {
        return false;
    }

    lower.contains("begin:vcalendar")
}

/// Parse raw feed text into the VEVENTs it contains.
///
/// Components missing a usable DTSTART are skipped (there is no day to place
/// them on); a document that does not parse at all is an error.
pub fn parse_feed(content: &str) -> FamCalResult<Vec<FeedEvent>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| FamCalError::InvalidFormat(e.to_string()))?;

    let events = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|vevent| {
            let start = vevent
                .find_prop("DTSTART")
                .and_then(|p| DatePerhapsTime::try_from(p).ok())
                .map(to_event_time)?;

            let end = vevent
                .find_prop("DTEND")
                .and_then(|p| DatePerhapsTime::try_from(p).ok())
                .map(to_event_time);

            let summary = vevent
                .find_prop("SUMMARY")
                .map(|p| p.val.to_string())
                .unwrap_or_else(|| "Untitled Event".to_string());

            let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
            let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());

            let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
            let exdates: Vec<EventTime> = vevent
                .properties
                .iter()
                .filter(|p| p.name == "EXDATE")
                .flat_map(parse_exdate_property)
                .collect();

            Some(FeedEvent {
                summary,
                description,
                location,
                start,
                end,
                rrule,
                exdates,
            })
        })
        .collect();

    Ok(events)
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an EXDATE property into a list of EventTime values.
///
/// Handles TZID parameters, VALUE=DATE, UTC and floating forms, and
/// comma-separated value lists.
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    let val_str = prop.val.as_ref();
    val_str
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if s.ends_with('Z') {
                let s = s.trim_end_matches('Z');
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_error_bodies() {
        assert!(!is_valid_ical_data("404 Not Found"));
        assert!(!is_valid_ical_data("Service Unavailable: 503"));
        assert!(!is_valid_ical_data("forbidden"));
        assert!(!is_valid_ical_data(""));
    }

    #[test]
    fn test_accepts_minimal_vcalendar() {
        assert!(is_valid_ical_data("BEGIN:VCALENDAR\nEND:VCALENDAR"));
        // Case-insensitive marker check
        assert!(is_valid_ical_data("begin:vcalendar\nend:vcalendar"));
    }

    #[test]
    fn test_long_body_with_indicator_still_valid() {
        // A real calendar may legitimately contain the word "error" in an
        // event title; only short bodies are treated as error pages.
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Fix 404 error page\nDTSTART;VALUE=DATE:20240301\nEND:VEVENT\nEND:VCALENDAR";
        assert!(is_valid_ical_data(ics));
    }

    #[test]
    fn test_parse_feed_extracts_events() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:one
SUMMARY:Dentist
DTSTART:20240115T090000Z
DTEND:20240115T100000Z
LOCATION:Main St
END:VEVENT
BEGIN:VEVENT
UID:two
SUMMARY:Vacation
DTSTART;VALUE=DATE:20240301
DTEND;VALUE=DATE:20240304
END:VEVENT
END:VCALENDAR"#;

        let events = parse_feed(ics).expect("should parse");
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].summary, "Dentist");
        assert_eq!(events[0].location.as_deref(), Some("Main St"));
        assert!(!events[0].is_multi_day());

        assert_eq!(events[1].summary, "Vacation");
        assert!(events[1].is_multi_day());
        assert_eq!(events[1].span_days(), 3);
    }

    #[test]
    fn test_parse_feed_keeps_rrule_and_exdates() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:weekly
SUMMARY:Standup
DTSTART:20240101T100000Z
DTEND:20240101T101500Z
RRULE:FREQ=WEEKLY;BYDAY=MO
EXDATE:20240108T100000Z
END:VEVENT
END:VCALENDAR"#;

        let events = parse_feed(ics).expect("should parse");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(events[0].exdates.len(), 1);
    }

    #[test]
    fn test_event_without_dtstart_is_skipped() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:broken
SUMMARY:No start
END:VEVENT
END:VCALENDAR"#;

        let events = parse_feed(ics).expect("should parse");
        assert!(events.is_empty());
    }
}
