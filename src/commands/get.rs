use anyhow::Result;

use crate::config;
use crate::gcal::GcalClient;

pub async fn run(id: String) -> Result<()> {
    let cfg = config::load_config()?;
    let gcal = GcalClient::connect(&cfg).await?;

    let event = gcal.get_event(&id).await?;

    println!("Summary:     {}", event.summary);
    println!("Start:       {}", event.start);
    println!("End:         {}", event.end);
    println!("Location:    {}", event.location.unwrap_or_default());
    println!("Description: {}", event.description.unwrap_or_default());
    println!("ID:          {}", event.id);
    Ok(())
}
