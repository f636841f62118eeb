//! Event types shared by the extractor, the reconciler, and the calendar client.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Start or end of an event: a bare date for all-day events, a zoned
/// datetime for timed ones. Renders as `YYYY-MM-DD` or RFC 3339, which is
/// both the CSV cell format and what the calendar API speaks.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl EventTime {
    /// The calendar date this time falls on, in the given timezone.
    pub fn date(&self, tz: Tz) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTime(dt) => dt.with_timezone(&tz).date_naive(),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl FromStr for EventTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(EventTime::Date(d));
        }
        let dt = DateTime::parse_from_rfc3339(s).with_context(|| {
            format!("Invalid event time \"{}\" (expected YYYY-MM-DD or RFC 3339)", s)
        })?;
        Ok(EventTime::DateTime(dt))
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A reminder attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Delivery method: "popup" for UI alerts, "email" for mail.
    pub method: String,
    /// Minutes before the event start to trigger.
    pub minutes: i64,
}

/// An event extracted from a bulletin email, not yet confirmed against the
/// calendar. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub is_deadline: bool,
    /// Attached by reconciliation to deadline survivors; never written to CSV.
    #[serde(skip)]
    pub reminder: Option<Reminder>,
}

/// An event that already exists on the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: Option<String>,
    pub location: Option<String>,
    pub reminders: Vec<Reminder>,
}

/// Write candidates as CSV with a `summary,start,end,description,location,is_deadline` header.
/// The header is written even when there are no rows.
pub fn write_csv<W: std::io::Write>(out: W, candidates: &[CandidateEvent]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer
        .write_record(["summary", "start", "end", "description", "location", "is_deadline"])
        .context("Failed to write CSV header")?;
    for candidate in candidates {
        writer
            .serialize(candidate)
            .with_context(|| format!("Failed to write CSV row for \"{}\"", candidate.summary))?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Read candidates back from CSV produced by `write_csv`.
pub fn read_csv<R: std::io::Read>(input: R) -> Result<Vec<CandidateEvent>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut candidates = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let candidate: CandidateEvent =
            row.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        candidates.push(candidate);
    }
    Ok(candidates)
}
