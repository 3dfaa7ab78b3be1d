//! Rebuild sessions from a messages snapshot

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use super::queries::parse_timestamp;
use crate::normalize::MESSAGES;
use crate::source::{Content, Message, Session, TokenUsage};
use crate::store::snapshot_columns;

/// Rebuild one session from the rows of a messages snapshot
///
/// Messages are ordered by timestamp. Structured content is recovered by
/// parsing `content_raw` back to JSON; only `tokens_total` survives of the
/// token counters. Rows without a readable timestamp are skipped. Returns
/// `None` when the session has no usable rows.
pub fn reconstruct_session(conn: &Connection, session_id: &str) -> rusqlite::Result<Option<Session>> {
    let columns = snapshot_columns(conn, MESSAGES)?;
    let tokens = if columns.iter().any(|c| c == "tokens_total") {
        "tokens_total"
    } else {
        "NULL"
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT id, timestamp, type, content_raw, projectHash, {}
         FROM messages WHERE sessionId = ? ORDER BY timestamp, rowid",
        tokens
    ))?;
    let rows = stmt.query_map(params![session_id], |row| {
        let id: Option<String> = row.get(0)?;
        let timestamp: Option<String> = row.get(1)?;
        let kind: Option<String> = row.get(2)?;
        let raw: Option<String> = row.get(3)?;
        let project_hash: Option<String> = row.get(4)?;
        let total: Option<i64> = row.get(5)?;

        let Some(timestamp) = timestamp.as_deref().and_then(parse_timestamp) else {
            return Ok(None);
        };
        let message = Message {
            id: id.unwrap_or_default(),
            timestamp,
            kind: kind.unwrap_or_else(|| "unknown".to_string()),
            content: content_from_raw(raw.unwrap_or_default()),
            thoughts: None,
            tokens: total.map(|total| TokenUsage {
                total: Some(total),
                ..Default::default()
            }),
            model: None,
            tool_calls: None,
        };
        Ok(Some((message, project_hash)))
    })?;

    let mut messages = vec![];
    let mut project_hash = None;
    let mut skipped = 0;
    for row in rows {
        let Some((message, hash)) = row? else {
            skipped += 1;
            continue;
        };
        if project_hash.is_none() {
            project_hash = hash;
        }
        messages.push(message);
    }
    if skipped > 0 {
        warn!("Skipped {} rows without a timestamp in session {}", skipped, session_id);
    }

    let (start_time, last_updated) = match (messages.first(), messages.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return Ok(None),
    };
    Ok(Some(Session {
        session_id: session_id.to_string(),
        project_hash: project_hash.unwrap_or_else(|| "unknown".to_string()),
        start_time,
        last_updated,
        messages,
    }))
}

/// Objects and arrays come back as structured content, anything else as text
fn content_from_raw(raw: String) -> Content {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Content::Structured(value),
        _ => Content::Text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fixtures::{message, session};
    use crate::normalize::messages_table;
    use crate::store::{open_snapshot, SqliteSnapshot, TableStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_reconstruct_round_trips_content() {
        let dir = TempDir::new().unwrap();
        let s = session(
            "s1",
            json!([
                message("m1", "user", json!("plain")),
                message("m2", "gemini", json!([{"text": "part"}])),
            ]),
        );
        let mut store = SqliteSnapshot::new(dir.path(), "");
        let info = store.write_table(&messages_table(&[s])).unwrap().unwrap();
        let conn = open_snapshot(&info.path).unwrap();

        let rebuilt = reconstruct_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(rebuilt.project_hash, "e".repeat(64));
        assert_eq!(rebuilt.messages.len(), 2);
        assert_eq!(rebuilt.messages[0].content, Content::Text("plain".into()));
        assert_eq!(
            rebuilt.messages[1].content,
            Content::Structured(json!([{"text": "part"}]))
        );
        assert!(rebuilt.messages[0].tokens.is_none());

        assert!(reconstruct_session(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_rows_without_timestamp_are_skipped() {
        let dir = TempDir::new().unwrap();
        let s = session(
            "s1",
            json!([
                message("m1", "user", json!("first")),
                message("m2", "gemini", json!("second")),
            ]),
        );
        let mut store = SqliteSnapshot::new(dir.path(), "");
        let info = store.write_table(&messages_table(&[s])).unwrap().unwrap();
        {
            let conn = Connection::open(&info.path).unwrap();
            conn.execute("UPDATE messages SET timestamp = NULL WHERE id = 'm2'", [])
                .unwrap();
            conn.execute(
                "INSERT INTO messages (id, sessionId, timestamp, type, content_raw)
                 VALUES ('m3', 's1', 'not a time', 'gemini', 'late')",
                [],
            )
            .unwrap();
        }
        let conn = open_snapshot(&info.path).unwrap();

        let rebuilt = reconstruct_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(rebuilt.messages.len(), 1);
        assert_eq!(rebuilt.messages[0].id, "m1");
        assert_eq!(rebuilt.start_time, rebuilt.last_updated);

        conn.close().unwrap();
        let conn = Connection::open(&info.path).unwrap();
        conn.execute("UPDATE messages SET timestamp = NULL", []).unwrap();
        assert!(reconstruct_session(&conn, "s1").unwrap().is_none());
    }

    #[test]
    fn test_content_from_raw() {
        assert_eq!(content_from_raw("42".into()), Content::Text("42".into()));
        assert_eq!(
            content_from_raw(r#"{"a":1}"#.into()),
            Content::Structured(json!({"a": 1}))
        );
    }
}
