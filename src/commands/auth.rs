use anyhow::Result;

use crate::config;
use crate::oauth;

pub async fn run() -> Result<()> {
    let cfg = config::load_config()?;

    println!("Authenticating with Google Calendar...");

    // Browser consent flow; blocks until the redirect comes back
    let tokens = oauth::authenticate(&cfg).await?;
    config::save_tokens(&tokens)?;

    println!("\nAuthenticated. Tokens saved to {}", config::tokens_path()?.display());
    println!("Run `schoolcal process --input <bulletin.eml>` to add events.");

    Ok(())
}
