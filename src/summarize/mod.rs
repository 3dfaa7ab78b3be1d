//! AI summaries of chat sessions
//!
//! A session is rendered as a plain-text transcript and handed to a
//! `Summarizer`, which must answer with exactly three fields: a title, key
//! points and an outcome. `GeminiSummarizer` talks to the Gemini
//! `generateContent` endpoint with a response schema enforcing that shape.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SummarizerConfig;
use crate::source::Session;

const SYSTEM_PROMPT: &str = "You are an expert technical assistant who understands data and code and systems. \
Summarize the following conversation between a user and an AI model. \
Identify any failures to communicate or errors.";

/// Structured summary of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSummary {
    pub title: String,
    pub key_points: Vec<String>,
    pub outcome: String,
}

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("summary does not match the expected shape: {0}")]
    Json(#[from] serde_json::Error),
}

/// An external text-summarization service
pub trait Summarizer {
    fn summarize(
        &self,
        transcript: &str,
    ) -> impl Future<Output = Result<SessionSummary, SummarizeError>> + Send;
}

/// Result of summarizing one session in a batch
#[derive(Debug)]
pub struct SummaryOutcome {
    pub session_id: String,
    pub result: Result<SessionSummary, SummarizeError>,
}

/// Render a session as the transcript sent for summarization
pub fn build_transcript(session: &Session) -> String {
    let duration = session.last_updated - session.start_time;
    let mut lines = vec![
        format!("SESSION START: {}", session.start_time.format("%Y-%m-%d %H:%M:%S")),
        format!(
            "SESSION END:   {}\n(DURATION: {})",
            session.last_updated.format("%Y-%m-%d %H:%M:%S"),
            format_duration(duration)
        ),
        "-".repeat(20),
    ];
    for message in &session.messages {
        let role = if message.is_user() { "USER" } else { "MODEL" };
        lines.push(format!("{}: {}", role, message.content.as_text()));
    }
    lines.join("\n")
}

/// `[N day(s), ]H:MM:SS[.ffffff]`
pub fn format_duration(duration: Duration) -> String {
    let total_micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let micros = total_micros % 1_000_000;
    let total_secs = total_micros / 1_000_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        out.push_str(&format!("{} {}, ", days, unit));
    }
    out.push_str(&format!("{}:{:02}:{:02}", hours, minutes, seconds));
    if micros > 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}

/// Summarize sessions one at a time; a failure only affects its own outcome
pub async fn summarize_sessions<S: Summarizer>(
    sessions: &[Session],
    summarizer: &S,
) -> Vec<SummaryOutcome> {
    let mut outcomes = Vec::with_capacity(sessions.len());
    for session in sessions {
        let transcript = build_transcript(session);
        let result = summarizer.summarize(&transcript).await;
        match &result {
            Ok(summary) => info!("Summarized {}: {}", session.session_id, summary.title),
            Err(e) => warn!("Failed to summarize {}: {}", session.session_id, e),
        }
        outcomes.push(SummaryOutcome {
            session_id: session.session_id.clone(),
            result,
        });
    }
    outcomes
}

/// Summarizer backed by the Gemini API
pub struct GeminiSummarizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiSummarizer {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, SummarizeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build from configuration, reading the key from the configured variable
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| SummarizeError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            &config.endpoint,
            &config.model,
            &api_key,
            std::time::Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(transcript: &str) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": [{"role": "user", "parts": [{"text": transcript}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {"type": "STRING"},
                        "key_points": {"type": "ARRAY", "items": {"type": "STRING"}},
                        "outcome": {"type": "STRING"}
                    },
                    "required": ["title", "key_points", "outcome"],
                    "propertyOrdering": ["title", "key_points", "outcome"]
                }
            }
        })
    }
}

impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<SessionSummary, SummarizeError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(transcript))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Status { status, body });
        }

        let body: Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                SummarizeError::MalformedResponse("no text in first candidate".to_string())
            })?;
        Ok(serde_json::from_str(text)?)
    }
}
