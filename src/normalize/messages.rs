//! Messages table

use serde_json::Value;

use super::{positions, Cell, Row, Table, MESSAGES};
use crate::source::{Content, Session};

/// Upper bound on `content_summary`, in characters
pub const SUMMARY_MAX_CHARS: usize = 200;

/// One row per message across all sessions
pub fn messages_table(sessions: &[Session]) -> Table {
    let mut rows = vec![];

    for session in sessions {
        for position in positions(session) {
            let message = position.message;
            let mut row = Row::new();

            row.set("id", message.id.as_str());
            row.set("timestamp", message.timestamp);
            row.set("type", message.kind.as_str());
            row.set("content", content_cell(&message.content));
            row.set("thoughts", optional_serialized(message.thoughts.as_ref()));
            row.set("tokens", optional_serialized(message.tokens.as_ref()));
            row.set("model", message.model.as_deref());
            row.set("toolCalls", optional_serialized(message.tool_calls.as_ref()));

            row.set("sessionId", session.session_id.as_str());
            row.set("projectHash", session.project_hash.as_str());
            row.set("startTime", session.start_time);
            row.set("messageIndex", position.index);
            if let Some(user_index) = position.user_index {
                row.set("userMessageIndex", user_index);
            }

            let raw = message.content.as_text();
            row.set("content_summary", content_summary(&message.content, &raw));
            row.set("content_raw", raw);

            if let Some(tokens) = &message.tokens {
                for (name, value) in tokens.reported() {
                    row.set(format!("tokens_{}", name), value);
                }
            }

            if let Some(thoughts) = message.thoughts.as_ref().filter(|t| !t.is_empty()) {
                let text = thoughts
                    .iter()
                    .map(|t| t.text())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                row.set("thoughts_text", text);
                row.set("thought_count", thoughts.len());
            }

            if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
                row.set("tool_call_count", calls.len());
            }

            rows.push(row);
        }
    }

    Table::new(MESSAGES, rows)
}

/// Short plain-text extract of message content
///
/// Records prefer `output`, then `message`, then the raw text. Sequences join
/// the first truthy `text`/`output`/`message` of each item (bare strings count
/// as themselves) and fall back to the raw text when nothing was found.
pub fn content_summary(content: &Content, raw: &str) -> String {
    let summary = match content {
        Content::Text(text) => text.clone(),
        Content::Structured(Value::Object(map)) => map
            .get("output")
            .or_else(|| map.get("message"))
            .map(value_text)
            .unwrap_or_else(|| raw.to_string()),
        Content::Structured(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => ["text", "output", "message"]
                        .iter()
                        .filter_map(|key| map.get(*key))
                        .find(|v| truthy(v))
                        .map(value_text),
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                raw.to_string()
            } else {
                parts.join(" ")
            }
        }
        Content::Structured(_) => raw.to_string(),
    };
    truncate_chars(&summary, SUMMARY_MAX_CHARS)
}

fn content_cell(content: &Content) -> Cell {
    match content {
        Content::Text(text) => Cell::Text(text.clone()),
        Content::Structured(value) => Cell::from_value(value),
    }
}

fn optional_serialized<T: serde::Serialize>(value: Option<&T>) -> Cell {
    value.map_or(Cell::Null, Cell::serialized)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
