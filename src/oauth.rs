//! Google OAuth 2.0: browser consent flow, code exchange, token refresh.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::{self, Config, Tokens};

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Access tokens are refreshed this many seconds before they actually expire.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Run the full OAuth authentication flow and return fresh tokens.
pub async fn authenticate(config: &Config) -> Result<Tokens> {
    let state = request_state();
    let auth_url = consent_url(&config.google_client_id, &state)?;

    println!("\nOpen this URL in your browser to authenticate:\n");
    println!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(auth_url.as_str()).is_err() {
        println!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, returned_state) = wait_for_callback()?;
    if returned_state != state {
        anyhow::bail!("OAuth state mismatch in callback; aborting");
    }

    println!("\nReceived authorization code, exchanging for tokens...");

    let response = token_request(&[
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("code", code.as_str()),
        ("grant_type", "authorization_code"),
        ("redirect_uri", REDIRECT_URI),
    ])
    .await
    .context("Failed to exchange code for tokens")?;

    let refresh_token = response
        .refresh_token
        .context("Google did not return a refresh token; revoke access and try again")?;

    Ok(Tokens {
        access_token: response.access_token,
        refresh_token,
        expires_at: expires_at(response.expires_in),
    })
}

/// Refresh an expired access token.
pub async fn refresh(config: &Config, tokens: &Tokens) -> Result<Tokens> {
    let response = token_request(&[
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("refresh_token", tokens.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ])
    .await
    .context("Failed to refresh token")?;

    // Google typically doesn't return a new refresh_token on refresh responses,
    // so preserve the original one when the response omits it
    let refresh_token = response
        .refresh_token
        .unwrap_or_else(|| tokens.refresh_token.clone());

    Ok(Tokens {
        access_token: response.access_token,
        refresh_token,
        expires_at: expires_at(response.expires_in),
    })
}

/// A valid access token: loads stored tokens, refreshing and re-persisting
/// them first if they are expired or close to it.
pub async fn access_token(config: &Config) -> Result<String> {
    let tokens = config::load_tokens()?;

    if !is_expired(&tokens, Utc::now()) {
        return Ok(tokens.access_token);
    }

    let refreshed = refresh(config, &tokens).await?;
    config::save_tokens(&refreshed)?;
    Ok(refreshed.access_token)
}

async fn token_request(params: &[(&str, &str)]) -> Result<TokenResponse> {
    let client = reqwest::Client::new();
    let response = client.post(TOKEN_ENDPOINT).form(params).send().await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        anyhow::bail!("Token endpoint returned {}: {}", status, body.trim());
    }

    serde_json::from_str(&body).context("Unexpected response from token endpoint")
}

/// Build the consent URL the user opens in their browser.
fn consent_url(client_id: &str, state: &str) -> Result<url::Url> {
    let mut url = url::Url::parse(AUTH_ENDPOINT)?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", state);
    Ok(url)
}

fn request_state() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}", nanos)
}

fn expires_at(expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in > 0 {
        Some(Utc::now() + chrono::Duration::seconds(expires_in))
    } else {
        None
    }
}

/// Whether the access token is expired (or will be within the buffer).
/// Tokens without expiry metadata are treated as expired so they get refreshed.
fn is_expired(tokens: &Tokens, now: DateTime<Utc>) -> bool {
    match tokens.expires_at {
        Some(expires_at) => expires_at - chrono::Duration::seconds(EXPIRY_BUFFER_SECS) <= now,
        None => true,
    }
}

/// Start a local HTTP server to receive the OAuth callback.
/// Returns (code, state).
fn wait_for_callback() -> Result<(String, String)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    println!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Request line looks like: GET /callback?code=xxx&state=yyy HTTP/1.1
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .context("No code in callback")?;

    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .context("No state in callback")?;

    // Send a response to the browser
    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok((code, state))
}
