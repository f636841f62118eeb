pub mod add;
pub mod auth;
pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod parse;
pub mod process;

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::NaiveDate;

use crate::config::Config;
use crate::event::{CalendarEvent, CandidateEvent};
use crate::gcal::GcalClient;
use crate::llm::LlmClient;
use crate::reconcile;

/// Reconcile candidates against the calendar and create the survivors.
/// Shared tail of `process` and `add`.
pub async fn reconcile_and_create(config: &Config, candidates: Vec<CandidateEvent>) -> Result<()> {
    if candidates.is_empty() {
        println!("No events to add.");
        return Ok(());
    }

    let tz = config.tz()?;
    let llm = LlmClient::new(config);
    let gcal = GcalClient::connect(config).await?;

    println!(
        "\n📅 Reconciling {} events against {}",
        candidates.len(),
        config.calendar_id
    );

    // One fetch per distinct date the candidates land on
    let dates: BTreeSet<NaiveDate> = candidates.iter().map(|c| c.start.date(tz)).collect();
    let mut existing: Vec<CalendarEvent> = Vec::new();
    for date in dates {
        existing.extend(gcal.list_events_for_date(date).await?);
    }

    let survivors = reconcile::reconcile(candidates.clone(), &existing, &llm, tz).await;

    // Survivors keep input order, so one forward pass pairs them up
    let mut remaining = survivors.into_iter().peekable();
    let mut created = 0;
    let mut skipped = 0;
    for candidate in &candidates {
        match remaining.next_if(|s| s.summary == candidate.summary && s.start == candidate.start) {
            Some(survivor) => {
                gcal.create_event(&survivor).await?;
                println!("  Created: {}", survivor.summary);
                created += 1;
            }
            None => {
                println!("  Skipped: {}", candidate.summary);
                skipped += 1;
            }
        }
    }

    println!("\n{} created, {} skipped", created, skipped);
    Ok(())
}
