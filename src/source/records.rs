//! Typed records for the assistant's session and log files
//!
//! Every field that has come and gone across log-format versions is kept as
//! an independent `Option`, so one schema absorbs all of them. Only the
//! identity fields (`Session.sessionId`, `Message.id`, `ToolCall.id`, ...)
//! are required. Optional fields of an unexpected shape read as absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::ValidationError;

/// Message type tag used for user turns
pub const USER_TYPE: &str = "user";

/// A chat session file (`chats/*.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub project_hash: String,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Session {
    /// Parse and validate a session record
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let session: Session = parse_record("Session", value)?;
        if session.last_updated < session.start_time {
            return Err(ValidationError::TimeOrder {
                session_id: session.session_id,
                start_time: session.start_time,
                last_updated: session.last_updated,
            });
        }
        Ok(session)
    }
}

/// One message within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Open set: "user", "gemini", "info", "error", ...
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Content,
    #[serde(default, deserialize_with = "lenient")]
    pub thoughts: Option<Vec<Thought>>,
    #[serde(default, deserialize_with = "lenient")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.kind == USER_TYPE
    }
}

/// Message content: plain text or an arbitrary JSON tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(Value),
}

impl Content {
    /// Text as-is, anything else as compact JSON
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Structured(value) => value.to_string(),
        }
    }
}

/// Token counters; `None` means "not reported", not zero
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: Option<i64>,
    #[serde(default)]
    pub output: Option<i64>,
    #[serde(default)]
    pub cached: Option<i64>,
    #[serde(default)]
    pub thoughts: Option<i64>,
    #[serde(default)]
    pub tool: Option<i64>,
    #[serde(default, alias = "cacheCreation")]
    pub cache_creation: Option<i64>,
    #[serde(default, alias = "cacheRead")]
    pub cache_read: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

impl TokenUsage {
    /// Reported counters in declaration order
    pub fn reported(&self) -> Vec<(&'static str, i64)> {
        [
            ("input", self.input),
            ("output", self.output),
            ("cached", self.cached),
            ("thoughts", self.thoughts),
            ("tool", self.tool),
            ("cache_creation", self.cache_creation),
            ("cache_read", self.cache_read),
            ("total", self.total),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// A model thought attached to a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    #[serde(default, deserialize_with = "lenient")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    /// Older files carry the text here instead of `description`
    #[serde(default, deserialize_with = "lenient")]
    pub thought: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Thought {
    /// Thought body: description first, then the legacy field
    pub fn body(&self) -> Option<&str> {
        non_empty(self.description.as_deref()).or_else(|| non_empty(self.thought.as_deref()))
    }

    /// Body prefixed with `[subject]` when a subject is present
    pub fn text(&self) -> String {
        let body = self.body().unwrap_or("");
        match non_empty(self.subject.as_deref()) {
            Some(subject) => format!("[{}] {}", subject, body),
            None => body.to_string(),
        }
    }
}

/// A tool invocation recorded on a model message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub args: Option<Map<String, Value>>,
    /// Newer files: a sequence of structured response records. A lone
    /// value from older files becomes a one-element sequence.
    #[serde(default, deserialize_with = "result_records")]
    pub result: Option<Vec<Value>>,
    /// Older files: a single output value
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_display: Option<Value>,
}

/// One record of a `logs.json` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub session_id: String,
    pub message_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, rename = "source_file")]
    pub source_file: Option<String>,
    #[serde(default)]
    pub project_hash: Option<String>,
    #[serde(default)]
    pub user_message_index: Option<i64>,
}

impl LogEntry {
    /// Parse a log record; derived fields are filled in by the loader
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        parse_record("LogEntry", value)
    }

    pub fn dedup_key(&self) -> (String, i64, DateTime<Utc>) {
        (self.session_id.clone(), self.message_id, self.timestamp)
    }
}

fn parse_record<T: DeserializeOwned>(
    entity: &'static str,
    value: Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|source| ValidationError::Schema { entity, source })
}

/// Optional field that reads a value of the wrong shape as `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn result_records<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(records) => Some(records),
        other => Some(vec![other]),
    })
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_json() -> Value {
        json!({
            "sessionId": "s-1",
            "projectHash": "a".repeat(64),
            "startTime": "2025-06-01T10:00:00.000Z",
            "lastUpdated": "2025-06-01T10:05:00.000Z",
            "messages": [
                {"id": "m1", "timestamp": "2025-06-01T10:00:01Z", "type": "user", "content": "hi"},
                {
                    "id": "m2",
                    "timestamp": "2025-06-01T10:00:02Z",
                    "type": "gemini",
                    "content": [{"text": "hello"}],
                    "tokens": {"input": 5, "cacheRead": 2},
                    "thoughts": [{"subject": "Plan", "thought": "legacy"}],
                    "toolCalls": [{"id": "t1", "name": "read_file", "args": {"path": "a.rs"}}]
                }
            ]
        })
    }

    #[test]
    fn test_session_parses_with_optional_fields() {
        let session = Session::from_value(session_json()).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert!(session.messages[0].is_user());
        assert_eq!(session.messages[0].content, Content::Text("hi".into()));

        let reply = &session.messages[1];
        assert!(matches!(reply.content, Content::Structured(Value::Array(_))));
        let tokens = reply.tokens.as_ref().unwrap();
        assert_eq!(tokens.cache_read, Some(2));
        assert_eq!(tokens.output, None);
        assert_eq!(reply.tool_calls.as_ref().unwrap()[0].id, "t1");
    }

    #[test]
    fn test_missing_session_id_is_validation_error() {
        let mut value = session_json();
        value.as_object_mut().unwrap().remove("sessionId");
        let err = Session::from_value(value).unwrap_err();
        assert!(matches!(err, ValidationError::Schema { entity: "Session", .. }));
        assert!(err.to_string().contains("sessionId"));
    }

    #[test]
    fn test_tool_call_requires_id() {
        let mut value = session_json();
        value["messages"][1]["toolCalls"][0]
            .as_object_mut()
            .unwrap()
            .remove("id");
        assert!(Session::from_value(value).is_err());
    }

    #[test]
    fn test_last_updated_before_start_rejected() {
        let mut value = session_json();
        value["lastUpdated"] = json!("2025-06-01T09:00:00Z");
        let err = Session::from_value(value).unwrap_err();
        assert!(matches!(err, ValidationError::TimeOrder { .. }));
    }

    #[test]
    fn test_token_aliases() {
        let tokens: TokenUsage =
            serde_json::from_value(json!({"cacheCreation": 3, "cache_read": 4, "total": 9})).unwrap();
        assert_eq!(tokens.cache_creation, Some(3));
        assert_eq!(tokens.cache_read, Some(4));
        assert_eq!(
            tokens.reported(),
            vec![("cache_creation", 3), ("cache_read", 4), ("total", 9)]
        );
    }

    #[test]
    fn test_thought_text_prefers_description() {
        let thought = Thought {
            subject: Some("Plan".into()),
            description: Some("new".into()),
            thought: Some("old".into()),
            timestamp: None,
        };
        assert_eq!(thought.text(), "[Plan] new");

        let legacy = Thought {
            thought: Some("old".into()),
            ..Default::default()
        };
        assert_eq!(legacy.text(), "old");
        assert_eq!(Thought::default().text(), "");
    }

    #[test]
    fn test_optional_fields_of_other_shapes_read_as_absent() {
        let mut value = session_json();
        value["messages"][1]["model"] = json!(42);
        value["messages"][1]["thoughts"][0]["timestamp"] = json!("yesterday");
        value["messages"][1]["toolCalls"][0]["result"] = json!("plain legacy text");
        value["messages"][1]["toolCalls"][0]["status"] = json!({"code": 0});
        value["messages"][1]["toolCalls"][0]["timestamp"] = json!(1717236000);

        let session = Session::from_value(value).unwrap();
        let reply = &session.messages[1];
        assert_eq!(reply.model, None);
        assert_eq!(reply.thoughts.as_ref().unwrap()[0].timestamp, None);
        assert_eq!(reply.thoughts.as_ref().unwrap()[0].subject.as_deref(), Some("Plan"));

        let call = &reply.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.result, Some(vec![json!("plain legacy text")]));
        assert_eq!(call.status, None);
        assert_eq!(call.timestamp, None);
        assert_eq!(call.name.as_deref(), Some("read_file"));
    }

    #[test]
    fn test_log_entry_requires_message_id() {
        let err = LogEntry::from_value(json!({
            "sessionId": "s", "type": "user", "message": "x",
            "timestamp": "2025-06-01T10:00:00Z"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("messageId"));
    }
}
