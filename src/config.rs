//! Config and token storage under ~/.config/schoolcal/.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const EXAMPLE_CONFIG: &str = r#"{
  "calendar_id": "primary",
  "llm_provider": "anthropic",
  "llm_model": "claude-sonnet-4-20250514",
  "llm_api_key": "sk-ant-...",
  "google_client_id": "your-client-id.apps.googleusercontent.com",
  "google_client_secret": "your-client-secret"
}"#;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Calendar to read from and create events on
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// LLM used for extraction and duplicate checks
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_api_key: String,

    /// Google OAuth app credentials
    pub google_client_id: String,
    pub google_client_secret: String,

    /// IANA timezone the bulletin's dates and times are interpreted in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

impl Config {
    /// The configured timezone, parsed. Validated once at load time.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("Unknown timezone \"{}\" in config", self.timezone))
    }
}

/// OAuth tokens for the authenticated Google account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Get the config directory path (~/.config/schoolcal)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("schoolcal");
    Ok(config_dir)
}

/// Get the config file path (~/.config/schoolcal/config.json)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Get the tokens file path (~/.config/schoolcal/tokens.json)
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.json"))
}

/// Parse and validate config file contents.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = serde_json::from_str(contents)?;
    config.tz()?;
    Ok(config)
}

/// Load config from ~/.config/schoolcal/config.json
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with your calendar and LLM settings:\n\n{}",
            path.display(),
            EXAMPLE_CONFIG
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    parse_config(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))
}

/// Load tokens from ~/.config/schoolcal/tokens.json
pub fn load_tokens() -> Result<Tokens> {
    let path = tokens_path()?;

    if !path.exists() {
        anyhow::bail!("Not authenticated with Google Calendar yet.\nRun `schoolcal auth` first.");
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tokens file at {}", path.display()))?;

    let tokens: Tokens = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tokens file at {}", path.display()))?;

    Ok(tokens)
}

/// Save tokens to ~/.config/schoolcal/tokens.json
pub fn save_tokens(tokens: &Tokens) -> Result<()> {
    let path = tokens_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write tokens file at {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"{
                "calendar_id": "family",
                "llm_provider": "openai",
                "llm_model": "gpt-4o-mini",
                "llm_api_key": "sk-test",
                "google_client_id": "id.apps.googleusercontent.com",
                "google_client_secret": "secret",
                "timezone": "Europe/Stockholm"
            }"#,
        )
        .unwrap();
        assert_eq!(config.calendar_id, "family");
        assert_eq!(config.llm_provider, LlmProvider::OpenAi);
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Stockholm);
    }

    #[test]
    fn calendar_id_and_timezone_default() {
        let config = parse_config(
            r#"{
                "llm_provider": "anthropic",
                "llm_model": "claude-sonnet-4-20250514",
                "llm_api_key": "sk-ant-test",
                "google_client_id": "id",
                "google_client_secret": "secret"
            }"#,
        )
        .unwrap();
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let result = parse_config(
            r#"{
                "llm_provider": "gemini",
                "llm_model": "m",
                "llm_api_key": "k",
                "google_client_id": "id",
                "google_client_secret": "secret"
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let result = parse_config(
            r#"{
                "llm_provider": "anthropic",
                "llm_model": "m",
                "llm_api_key": "k",
                "google_client_id": "id",
                "google_client_secret": "secret",
                "timezone": "Mars/Olympus_Mons"
            }"#,
        );
        assert!(result.is_err());
    }
}
