//! Calls to the configured language model: event extraction from bulletin
//! text, and duplicate verdicts during reconciliation.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{Config, LlmProvider};
use crate::event::{CalendarEvent, CandidateEvent, EventTime};

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const EXTRACT_MAX_TOKENS: u32 = 4096;
const DEDUP_MAX_TOKENS: u32 = 256;

const EXTRACT_PROMPT: &str = r#"You are given the plain-text body of a school bulletin email.
Extract every event that has a date and/or time mentioned.

Rules:
- Infer the year from context (the bulletin date in the subject or body tells you the year).
- If a date range is given (e.g. "Feb 16-20"), expand it into one row per day.
- Return ONLY a JSON array of objects. No other text.
- Each object must have exactly these keys:
  - "summary": short title for the event
  - "date": string in YYYY-MM-DD format
  - "time": string in HH:MM or HH:MM-HH:MM (24-hour) format, or "" if no specific time
  - "location": where the event takes place, or "" if not mentioned
  - "description": one-line detail beyond the summary, or "" if there is none
  - "is_deadline": boolean - true if the event is a deadline, due date, registration
    closing, or similar time-sensitive cutoff; false otherwise

Example output:
[
  {"summary": "ParentEd Talks", "date": "2026-02-10", "time": "12:00-13:00", "location": "Main Hall", "description": "Guest speaker on teen sleep", "is_deadline": false},
  {"summary": "Auction Donations Due", "date": "2026-02-12", "time": "", "location": "", "description": "", "is_deadline": true}
]

Here is the email text:

"#;

fn dedup_prompt(new_event: &str, existing_events: &str) -> String {
    format!(
        r#"You are given a new calendar event and a list of existing calendar events on the same date.
Determine whether the new event is a duplicate of any existing event.
Two events are duplicates if they refer to the same real-world event, even if the wording differs slightly.

New event:
{new_event}

Existing events:
{existing_events}

Respond with ONLY a JSON object: {{"is_duplicate": true}} or {{"is_duplicate": false}}"#
    )
}

pub struct LlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    model: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        LlmClient {
            http: reqwest::Client::new(),
            provider: config.llm_provider,
            model: config.llm_model.clone(),
            api_key: config.llm_api_key.clone(),
        }
    }

    /// Extract candidate events from a bulletin body. A malformed reply,
    /// including a single bad row, fails the whole extraction.
    pub async fn extract_events(&self, text: &str, tz: Tz) -> Result<Vec<CandidateEvent>> {
        let prompt = format!("{}{}", EXTRACT_PROMPT, text);
        let raw = self.complete(&prompt, EXTRACT_MAX_TOKENS).await?;
        parse_extraction(&raw, tz)
    }

    /// Ask the model whether a candidate duplicates any of the events
    /// already on the calendar that day.
    pub async fn is_duplicate(
        &self,
        candidate: &CandidateEvent,
        existing: &[CalendarEvent],
    ) -> Result<bool> {
        if existing.is_empty() {
            return Ok(false);
        }
        let prompt = dedup_prompt(&describe_candidate(candidate), &describe_existing(existing));
        let raw = self.complete(&prompt, DEDUP_MAX_TOKENS).await?;
        parse_verdict(&raw)
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        match self.provider {
            LlmProvider::Anthropic => self.complete_anthropic(prompt, max_tokens).await,
            LlmProvider::OpenAi => self.complete_openai(prompt).await,
        }
    }

    async fn complete_anthropic(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(ANTHROPIC_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Anthropic API request failed")?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(model_error("Anthropic", status, &text));
        }

        let body: AnthropicResponse =
            serde_json::from_str(&text).context("Unexpected response from the Anthropic API")?;
        body.content
            .into_iter()
            .next()
            .map(|block| block.text)
            .context("Anthropic API returned an empty reply")
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(OPENAI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("OpenAI API request failed")?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(model_error("OpenAI", status, &text));
        }

        let body: OpenAiResponse =
            serde_json::from_str(&text).context("Unexpected response from the OpenAI API")?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("OpenAI API returned an empty reply")
    }
}

// ==================== Wire types ====================

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

/// One row of the extraction reply, as the prompt specifies it.
#[derive(Debug, Deserialize)]
struct ExtractedRow {
    summary: String,
    date: NaiveDate,
    #[serde(default)]
    time: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    is_deadline: bool,
}

// ==================== Reply parsing ====================

fn parse_extraction(raw: &str, tz: Tz) -> Result<Vec<CandidateEvent>> {
    let rows: Vec<ExtractedRow> = serde_json::from_str(strip_code_fences(raw))
        .context("Model reply is not the expected JSON array of events")?;
    rows.iter().map(|row| to_candidate(row, tz)).collect()
}

fn to_candidate(row: &ExtractedRow, tz: Tz) -> Result<CandidateEvent> {
    let (start, end) = row_times(row.date, &row.time, tz)
        .with_context(|| format!("Bad time \"{}\" for \"{}\"", row.time, row.summary))?;
    Ok(CandidateEvent {
        summary: row.summary.trim().to_string(),
        start,
        end,
        description: non_empty(&row.description),
        location: non_empty(&row.location),
        is_deadline: row.is_deadline,
        reminder: None,
    })
}

/// Map a `""`, `"HH:MM"`, or `"HH:MM-HH:MM"` time cell onto start/end.
/// Empty means all day with an exclusive end on the next date; a lone
/// start time gets a one-hour default duration.
fn row_times(date: NaiveDate, time: &str, tz: Tz) -> Result<(EventTime, EventTime)> {
    let time = time.trim();
    if time.is_empty() {
        return Ok((
            EventTime::Date(date),
            EventTime::Date(date + chrono::Duration::days(1)),
        ));
    }

    let (start_raw, end_raw) = match time.split_once('-') {
        Some((s, e)) => (s.trim(), Some(e.trim())),
        None => (time, None),
    };

    let start_naive = date.and_time(parse_hhmm(start_raw)?);
    let start = resolve_local(start_naive, tz)?;
    let end = match end_raw {
        Some(e) => resolve_local(date.and_time(parse_hhmm(e)?), tz)?,
        None => resolve_local(start_naive + chrono::Duration::hours(1), tz)?,
    };
    Ok((start, end))
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .with_context(|| format!("Expected HH:MM, got \"{}\"", s))
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Result<EventTime> {
    let dt = tz
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Local time {} does not exist in {}", naive, tz))?;
    Ok(EventTime::DateTime(dt.fixed_offset()))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_verdict(raw: &str) -> Result<bool> {
    #[derive(Deserialize)]
    struct Verdict {
        is_duplicate: bool,
    }

    let verdict: Verdict = serde_json::from_str(strip_code_fences(raw))
        .context("Model reply is not the expected duplicate verdict")?;
    Ok(verdict.is_duplicate)
}

/// Strip a markdown code fence if the model wrapped its reply in one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the rest of the fence line ("json" and the like), then the
    // closing fence.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    match body.rsplit_once("```") {
        Some((inner, _)) => inner.trim(),
        None => body.trim(),
    }
}

// ==================== Prompt formatting ====================

fn describe_candidate(candidate: &CandidateEvent) -> String {
    format!(
        "Title: {}, Start: {}, End: {}",
        candidate.summary, candidate.start, candidate.end
    )
}

fn describe_existing(existing: &[CalendarEvent]) -> String {
    existing
        .iter()
        .map(|e| format!("- Title: {}, Start: {}, End: {}", e.summary, e.start, e.end))
        .collect::<Vec<_>>()
        .join("\n")
}

fn model_error(provider: &str, status: StatusCode, body: &str) -> anyhow::Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    anyhow::anyhow!("{} API error ({}): {}", provider, status, detail)
}
