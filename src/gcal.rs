//! Thin client for the Google Calendar v3 events API.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::event::{CalendarEvent, CandidateEvent, EventTime, Reminder};
use crate::oauth;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct GcalClient {
    http: reqwest::Client,
    access_token: String,
    calendar_id: String,
    tz: Tz,
}

/// What the API reports back about a freshly created event.
#[derive(Debug)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

impl GcalClient {
    /// Build a client with a valid access token (refreshing stored tokens if needed).
    pub async fn connect(config: &Config) -> Result<Self> {
        let access_token = oauth::access_token(config).await?;
        Ok(GcalClient {
            http: reqwest::Client::new(),
            access_token,
            calendar_id: config.calendar_id.clone(),
            tz: config.tz()?,
        })
    }

    /// List upcoming events, soonest first.
    pub async fn list_events(&self, max_results: usize) -> Result<Vec<CalendarEvent>> {
        let query = [
            ("timeMin", Utc::now().to_rfc3339()),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        let page = self.fetch_page(&query, None).await?;
        Ok(collect_events(page.items))
    }

    /// List all events on a specific date (midnight to midnight in the
    /// configured timezone).
    pub async fn list_events_for_date(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let time_min = local_midnight(self.tz, date)?.with_timezone(&Utc);
        let time_max = local_midnight(self.tz, date + chrono::Duration::days(1))?.with_timezone(&Utc);

        let query = [
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.fetch_page(&query, page_token.as_deref()).await?;
            events.extend(collect_events(page.items));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(events)
    }

    /// Create an event from a candidate. Reminder annotations become
    /// explicit overrides; without one the calendar's defaults apply.
    pub async fn create_event(&self, candidate: &CandidateEvent) -> Result<CreatedEvent> {
        let body = to_wire(candidate, self.tz.name());
        let url = format!("{}/calendars/{}/events", API_BASE, self.calendar_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to create event: {}", candidate.summary))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(provider_error("Calendar API error", status, &text));
        }

        let created: GcalEvent = serde_json::from_str(&text)
            .context("Unexpected response from event insert")?;
        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }

    /// Retrieve a single event by ID.
    pub async fn get_event(&self, event_id: &str) -> Result<CalendarEvent> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            API_BASE, self.calendar_id, event_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch event {}", event_id))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(provider_error("Calendar API error", status, &text));
        }

        let event: GcalEvent =
            serde_json::from_str(&text).context("Unexpected response from event get")?;
        from_wire(event)
    }

    /// Delete an event by ID. Already-gone events are treated as deleted.
    pub async fn delete_event(&self, event_id: &str) -> Result<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            API_BASE, self.calendar_id, event_id
        );

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to delete event {}", event_id))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::GONE {
            return Ok(());
        }
        let text = response.text().await?;
        Err(provider_error("Calendar API error", status, &text))
    }

    async fn fetch_page(&self, query: &[(&str, String)], page_token: Option<&str>) -> Result<EventList> {
        let url = format!("{}/calendars/{}/events", API_BASE, self.calendar_id);

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.context("Failed to fetch events")?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(provider_error("Calendar API error", status, &text));
        }

        serde_json::from_str(&text).context("Unexpected response from event list")
    }
}

// ==================== Wire types ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GcalEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcalEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<GcalEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<GcalEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reminders: Option<GcalReminders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    html_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcalEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcalReminders {
    #[serde(default)]
    use_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    overrides: Vec<GcalReminderOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GcalReminderOverride {
    method: String,
    minutes: i64,
}

// ==================== Conversions ====================

/// Convert fetched events, skipping cancelled ones and ones without
/// usable start/end times.
fn collect_events(items: Vec<GcalEvent>) -> Vec<CalendarEvent> {
    items
        .into_iter()
        .filter(|e| e.status.as_deref() != Some("cancelled") && !e.id.is_empty())
        .filter_map(|e| from_wire(e).ok())
        .collect()
}

fn from_wire(event: GcalEvent) -> Result<CalendarEvent> {
    let start = event
        .start
        .as_ref()
        .context("Event has no start time")
        .and_then(parse_event_time)?;
    let end = event
        .end
        .as_ref()
        .context("Event has no end time")
        .and_then(parse_event_time)?;

    let reminders = match &event.reminders {
        Some(rem) => rem
            .overrides
            .iter()
            .map(|r| Reminder {
                method: r.method.clone(),
                minutes: r.minutes,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(CalendarEvent {
        id: event.id,
        summary: event.summary.unwrap_or_else(|| "(no title)".to_string()),
        start,
        end,
        description: event.description,
        location: event.location,
        reminders,
    })
}

fn parse_event_time(raw: &GcalEventTime) -> Result<EventTime> {
    if let Some(s) = &raw.date_time {
        let dt = DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid dateTime \"{}\" in event", s))?;
        return Ok(EventTime::DateTime(dt));
    }
    if let Some(d) = raw.date {
        return Ok(EventTime::Date(d));
    }
    anyhow::bail!("Event time has neither date nor dateTime")
}

fn to_event_time(time: &EventTime, tz_name: &str) -> GcalEventTime {
    match time {
        EventTime::Date(d) => GcalEventTime {
            date: Some(*d),
            date_time: None,
            time_zone: None,
        },
        EventTime::DateTime(dt) => GcalEventTime {
            date: None,
            date_time: Some(dt.to_rfc3339()),
            time_zone: Some(tz_name.to_string()),
        },
    }
}

/// Build the insert body for a candidate. The ID is left empty so the
/// API assigns one.
fn to_wire(candidate: &CandidateEvent, tz_name: &str) -> GcalEvent {
    let reminders = candidate.reminder.as_ref().map(|r| GcalReminders {
        use_default: false,
        overrides: vec![GcalReminderOverride {
            method: r.method.clone(),
            minutes: r.minutes,
        }],
    });

    GcalEvent {
        id: String::new(),
        status: None,
        summary: Some(candidate.summary.clone()),
        description: candidate.description.clone(),
        location: candidate.location.clone(),
        start: Some(to_event_time(&candidate.start, tz_name)),
        end: Some(to_event_time(&candidate.end, tz_name)),
        reminders,
        html_link: None,
    }
}

/// Midnight at the start of `date` in `tz`.
fn local_midnight(tz: Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .with_context(|| format!("No valid local midnight for {} in {}", date, tz))
}

/// Surface the provider's own error message when the body carries one.
fn provider_error(what: &str, status: StatusCode, body: &str) -> anyhow::Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::UNAUTHORIZED {
        anyhow::anyhow!(
            "{} ({}): {}\nRun `schoolcal auth` to re-authenticate.",
            what,
            status,
            detail
        )
    } else {
        anyhow::anyhow!("{} ({}): {}", what, status, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(reminder: Option<Reminder>) -> CandidateEvent {
        let tz = chrono_tz::America::Los_Angeles;
        let start = tz.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        CandidateEvent {
            summary: "ParentEd Talks".to_string(),
            start: EventTime::DateTime(start.fixed_offset()),
            end: EventTime::DateTime((start + chrono::Duration::hours(1)).fixed_offset()),
            description: Some("Guest speaker".to_string()),
            location: None,
            is_deadline: reminder.is_some(),
            reminder,
        }
    }

    // --- wire → domain ---

    #[test]
    fn parse_timed_event_from_wire() {
        let event: GcalEvent = serde_json::from_str(
            r#"{
                "id": "abc123",
                "status": "confirmed",
                "summary": "ParentEd Talks",
                "start": {"dateTime": "2026-02-10T12:00:00-08:00"},
                "end": {"dateTime": "2026-02-10T13:00:00-08:00"},
                "reminders": {"useDefault": false, "overrides": [{"method": "popup", "minutes": 240}]}
            }"#,
        )
        .unwrap();

        let parsed = from_wire(event).unwrap();
        assert_eq!(parsed.id, "abc123");
        assert_eq!(parsed.start, "2026-02-10T12:00:00-08:00".parse().unwrap());
        assert_eq!(
            parsed.reminders,
            vec![Reminder {
                method: "popup".to_string(),
                minutes: 240
            }]
        );
    }

    #[test]
    fn parse_all_day_event_from_wire() {
        let event: GcalEvent = serde_json::from_str(
            r#"{
                "id": "def456",
                "summary": "Auction Donations Due",
                "start": {"date": "2026-02-12"},
                "end": {"date": "2026-02-13"}
            }"#,
        )
        .unwrap();

        let parsed = from_wire(event).unwrap();
        assert_eq!(
            parsed.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 2, 12).unwrap())
        );
        assert!(parsed.reminders.is_empty());
    }

    #[test]
    fn untitled_events_get_placeholder() {
        let event: GcalEvent = serde_json::from_str(
            r#"{"id": "x", "start": {"date": "2026-02-12"}, "end": {"date": "2026-02-13"}}"#,
        )
        .unwrap();
        assert_eq!(from_wire(event).unwrap().summary, "(no title)");
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let list: EventList = serde_json::from_str(
            r#"{"items": [
                {"id": "a", "status": "cancelled",
                 "start": {"date": "2026-02-12"}, "end": {"date": "2026-02-13"}},
                {"id": "b", "status": "confirmed", "summary": "Book Fair",
                 "start": {"date": "2026-02-12"}, "end": {"date": "2026-02-13"}}
            ]}"#,
        )
        .unwrap();

        let events = collect_events(list.items);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "b");
    }

    #[test]
    fn empty_list_response_parses() {
        let list: EventList = serde_json::from_str("{}").unwrap();
        assert!(collect_events(list.items).is_empty());
    }

    // --- domain → wire ---

    #[test]
    fn insert_body_for_timed_candidate() {
        let body = to_wire(&candidate(None), "America/Los_Angeles");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["summary"], "ParentEd Talks");
        assert_eq!(json["start"]["dateTime"], "2026-02-10T12:00:00-08:00");
        assert_eq!(json["start"]["timeZone"], "America/Los_Angeles");
        assert_eq!(json["end"]["dateTime"], "2026-02-10T13:00:00-08:00");
        // Google assigns the ID, and no reminder override was attached
        assert!(json.get("id").is_none());
        assert!(json.get("reminders").is_none());
    }

    #[test]
    fn insert_body_carries_reminder_override() {
        let body = to_wire(
            &candidate(Some(Reminder {
                method: "popup".to_string(),
                minutes: 240,
            })),
            "America/Los_Angeles",
        );
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["reminders"]["useDefault"], false);
        assert_eq!(json["reminders"]["overrides"][0]["method"], "popup");
        assert_eq!(json["reminders"]["overrides"][0]["minutes"], 240);
    }

    #[test]
    fn insert_body_for_all_day_candidate() {
        let all_day = CandidateEvent {
            summary: "Book Fair".to_string(),
            start: EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()),
            end: EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()),
            description: None,
            location: None,
            is_deadline: false,
            reminder: None,
        };
        let json = serde_json::to_value(to_wire(&all_day, "America/Los_Angeles")).unwrap();

        assert_eq!(json["start"]["date"], "2026-03-02");
        assert_eq!(json["end"]["date"], "2026-03-03");
        assert!(json["start"].get("dateTime").is_none());
        assert!(json["start"].get("timeZone").is_none());
    }

    // --- helpers ---

    #[test]
    fn day_window_is_local() {
        let midnight = local_midnight(
            chrono_tz::America::Los_Angeles,
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        )
        .unwrap();
        assert_eq!(
            midnight.with_timezone(&Utc).to_rfc3339(),
            "2026-02-10T08:00:00+00:00"
        );
    }

    #[test]
    fn provider_error_prefers_api_message() {
        let err = provider_error(
            "Calendar API error",
            StatusCode::NOT_FOUND,
            r#"{"error": {"code": 404, "message": "Not Found"}}"#,
        );
        assert!(err.to_string().contains("Not Found"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn provider_error_falls_back_to_raw_body() {
        let err = provider_error("Calendar API error", StatusCode::BAD_GATEWAY, "upstream sad");
        assert!(err.to_string().contains("upstream sad"));
    }
}
