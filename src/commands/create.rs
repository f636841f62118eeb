use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::config;
use crate::event::{CandidateEvent, EventTime};
use crate::gcal::GcalClient;

pub async fn run(
    summary: String,
    start: String,
    end: String,
    description: Option<String>,
    location: Option<String>,
) -> Result<()> {
    let cfg = config::load_config()?;
    let tz = cfg.tz()?;

    let candidate = CandidateEvent {
        summary,
        start: parse_time_arg(&start, tz)?,
        end: parse_time_arg(&end, tz)?,
        description,
        location,
        is_deadline: false,
        reminder: None,
    };

    let gcal = GcalClient::connect(&cfg).await?;
    let created = gcal.create_event(&candidate).await?;
    println!("Created event: {}", created.html_link.unwrap_or(created.id));
    Ok(())
}

/// Accept RFC 3339, a bare date (all-day), or a naive `YYYY-MM-DDTHH:MM`
/// interpreted in the configured timezone.
fn parse_time_arg(s: &str, tz: Tz) -> Result<EventTime> {
    if let Ok(t) = s.parse::<EventTime>() {
        return Ok(t);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| {
            format!(
                "Invalid time \"{}\" (expected YYYY-MM-DD, YYYY-MM-DDTHH:MM, or RFC 3339)",
                s
            )
        })?;
    let dt = tz
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Local time {} does not exist in {}", naive, tz))?;
    Ok(EventTime::DateTime(dt.fixed_offset()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TZ: Tz = chrono_tz::America::Los_Angeles;

    #[test]
    fn naive_datetime_is_localized() {
        let t = parse_time_arg("2026-02-10T12:00", TZ).unwrap();
        assert_eq!(t, "2026-02-10T12:00:00-08:00".parse().unwrap());
    }

    #[test]
    fn naive_datetime_with_seconds() {
        let t = parse_time_arg("2026-02-10T12:00:30", TZ).unwrap();
        assert_eq!(t, "2026-02-10T12:00:30-08:00".parse().unwrap());
    }

    #[test]
    fn rfc3339_keeps_its_offset() {
        let t = parse_time_arg("2026-02-10T12:00:00+01:00", TZ).unwrap();
        assert_eq!(t, "2026-02-10T12:00:00+01:00".parse().unwrap());
    }

    #[test]
    fn bare_date_is_all_day() {
        assert_eq!(
            parse_time_arg("2026-02-10", TZ).unwrap(),
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap())
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_time_arg("next tuesday", TZ).is_err());
    }
}
