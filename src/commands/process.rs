use std::path::PathBuf;

use anyhow::Result;

use crate::config;
use crate::eml;
use crate::llm::LlmClient;

pub async fn run(input: PathBuf) -> Result<()> {
    let cfg = config::load_config()?;
    let tz = cfg.tz()?;

    println!("📧 Parsing: {}", input.display());
    let body = eml::parse_eml(&input)?;

    let candidates = LlmClient::new(&cfg).extract_events(&body, tz).await?;
    println!("  Extracted {} events", candidates.len());

    super::reconcile_and_create(&cfg, candidates).await
}
