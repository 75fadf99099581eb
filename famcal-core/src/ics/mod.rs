//! Feed-side ICS types and parsing.

mod parse;

pub use parse::{is_valid_ical_data, parse_feed};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A start or end time as carried by an ICS property.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// The calendar day this time falls on, as written in the feed.
    pub fn date_naive(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTimeUtc(dt) => dt.date_naive(),
            EventTime::DateTimeFloating(dt) => dt.date(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.date(),
        }
    }

    /// Wall-clock time of day, None for all-day values.
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        match self {
            EventTime::Date(_) => None,
            EventTime::DateTimeUtc(dt) => Some(dt.time()),
            EventTime::DateTimeFloating(dt) => Some(dt.time()),
            EventTime::DateTimeZoned { datetime, .. } => Some(datetime.time()),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

/// One VEVENT lifted out of a parsed feed, before expansion.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    /// RRULE value (without the property name) for recurring events.
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
}

impl FeedEvent {
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    /// Number of calendar days this event covers. DTEND is exclusive for
    /// all-day events, so a 2024-03-01..2024-03-04 event covers 3 days.
    pub fn span_days(&self) -> i64 {
        match &self.end {
            Some(end) => (end.date_naive() - self.start.date_naive()).num_days().max(1),
            None => 1,
        }
    }

    /// All-day events covering more than one day expand into one occurrence
    /// per covered day. Timed events always count as single-day.
    pub fn is_multi_day(&self) -> bool {
        match &self.end {
            Some(end) => self.start.is_date() && end.is_date() && self.span_days() > 1,
            None => false,
        }
    }
}
