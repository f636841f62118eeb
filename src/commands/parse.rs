use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config;
use crate::eml;
use crate::event;
use crate::llm::LlmClient;

pub async fn run(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config()?;
    let tz = cfg.tz()?;

    let body = eml::parse_eml(&input)?;
    let candidates = LlmClient::new(&cfg).extract_events(&body, tz).await?;

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            event::write_csv(file, &candidates)?;
            println!("Wrote {} events to {}", candidates.len(), path.display());
        }
        // Keep stdout pure CSV so it can be redirected for `add`
        None => event::write_csv(std::io::stdout(), &candidates)?,
    }
    Ok(())
}
