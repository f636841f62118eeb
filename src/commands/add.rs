use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config;
use crate::event;

pub async fn run(input: PathBuf) -> Result<()> {
    let cfg = config::load_config()?;

    let file =
        File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let candidates = event::read_csv(file)?;
    println!("📄 Read {} events from {}", candidates.len(), input.display());

    super::reconcile_and_create(&cfg, candidates).await
}
