use anyhow::Result;

use crate::config;
use crate::gcal::GcalClient;

pub async fn run(max: usize) -> Result<()> {
    let cfg = config::load_config()?;
    let gcal = GcalClient::connect(&cfg).await?;

    let events = gcal.list_events(max).await?;
    if events.is_empty() {
        println!("No upcoming events found.");
        return Ok(());
    }

    for event in events {
        println!("{}  {}  [id: {}]", event.start, event.summary, event.id);
    }
    Ok(())
}
