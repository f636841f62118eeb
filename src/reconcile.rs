//! Duplicate reconciliation: decides which extracted candidates are
//! actually new, and attaches morning reminders to surviving deadlines.

use chrono::Timelike;
use chrono_tz::Tz;

use crate::event::{CalendarEvent, CandidateEvent, EventTime, Reminder};
use crate::llm::LlmClient;

/// Deadline reminders target this local wall-clock time on the event's
/// date, expressed as minutes past midnight.
const MORNING_MINUTES: i64 = 8 * 60;

/// What the cheap comparison rungs can already decide about a candidate.
#[derive(Debug, PartialEq)]
enum Screen {
    /// Normalized summary and start match an existing event.
    Duplicate,
    /// Same-date events exist but none matches exactly; ask the model.
    Undecided,
    /// Nothing else on that date; no comparison needed.
    Fresh,
}

/// Filter out candidates already present on the calendar and attach
/// reminders to the deadlines that remain.
///
/// Candidates are judged only against existing events on the same local
/// date. An exact match (normalized summary plus equal start) drops the
/// candidate without a model call; otherwise, if the date has any events
/// at all, the model gives a fuzzy verdict. A candidate whose fuzzy check
/// fails is skipped with a warning rather than created: a skipped event
/// is recovered by re-running, a duplicate sticks.
pub async fn reconcile(
    candidates: Vec<CandidateEvent>,
    existing: &[CalendarEvent],
    llm: &LlmClient,
    tz: Tz,
) -> Vec<CandidateEvent> {
    let mut kept = Vec::new();

    for mut candidate in candidates {
        let same_day = same_date_events(existing, &candidate, tz);

        match screen(&candidate, &same_day) {
            Screen::Duplicate => continue,
            Screen::Undecided => match llm.is_duplicate(&candidate, &same_day).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    eprintln!(
                        "Warning: could not check \"{}\" for duplicates ({:#}); skipping it",
                        candidate.summary, err
                    );
                    continue;
                }
            },
            Screen::Fresh => {}
        }

        if candidate.is_deadline {
            candidate.reminder = Some(deadline_reminder(&candidate.start, tz));
        }
        kept.push(candidate);
    }

    kept
}

fn screen(candidate: &CandidateEvent, same_day: &[CalendarEvent]) -> Screen {
    if same_day.is_empty() {
        return Screen::Fresh;
    }
    let wanted = normalized_summary(&candidate.summary);
    let exact = same_day
        .iter()
        .any(|e| normalized_summary(&e.summary) == wanted && e.start == candidate.start);
    if exact {
        Screen::Duplicate
    } else {
        Screen::Undecided
    }
}

/// Existing events whose start falls on the candidate's local date.
fn same_date_events(
    existing: &[CalendarEvent],
    candidate: &CandidateEvent,
    tz: Tz,
) -> Vec<CalendarEvent> {
    let date = candidate.start.date(tz);
    existing
        .iter()
        .filter(|e| e.start.date(tz) == date)
        .cloned()
        .collect()
}

/// Lowercased, whitespace-collapsed form used for exact comparison.
fn normalized_summary(summary: &str) -> String {
    summary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A popup at 08:00 local on the event's date, or at the start itself
/// for events that begin earlier (reminder offsets cannot be negative,
/// and all-day events are anchored at midnight).
fn deadline_reminder(start: &EventTime, tz: Tz) -> Reminder {
    let minutes = match start {
        EventTime::Date(_) => 0,
        EventTime::DateTime(dt) => {
            let local = dt.with_timezone(&tz).time();
            let since_midnight = i64::from(local.num_seconds_from_midnight()) / 60;
            (since_midnight - MORNING_MINUTES).max(0)
        }
    };
    Reminder {
        method: "popup".to_string(),
        minutes,
    }
}
