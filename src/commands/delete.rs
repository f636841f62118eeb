use anyhow::Result;

use crate::config;
use crate::gcal::GcalClient;

pub async fn run(id: String) -> Result<()> {
    let cfg = config::load_config()?;
    let gcal = GcalClient::connect(&cfg).await?;

    gcal.delete_event(&id).await?;
    println!("Deleted event {}", id);
    Ok(())
}
