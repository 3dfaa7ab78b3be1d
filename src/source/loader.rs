//! Session and log-entry loaders
//!
//! Every file is handled in isolation: a file that cannot be read, parsed or
//! validated is logged and skipped, and the remaining files still load.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};

use super::{path_string, project_hash_from_path, LoadError, LogEntry, Session};

/// Load log entries from `logs.json` files
///
/// Entries are de-duplicated on (sessionId, messageId, timestamp); the first
/// occurrence in input order wins.
pub fn load_log_entries<I, P>(paths: I) -> Vec<LogEntry>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let _span = info_span!("load_log_entries").entered();

    let mut entries = vec![];
    let mut seen = HashSet::new();

    for path in paths {
        let path = path.as_ref();
        match read_log_file(path) {
            Ok((file_entries, skipped)) => {
                if skipped > 0 {
                    warn!(
                        "Skipped {} invalid log entries in {}",
                        skipped,
                        path.display()
                    );
                }
                for entry in file_entries {
                    if seen.insert(entry.dedup_key()) {
                        entries.push(entry);
                    }
                }
            }
            Err(e) => warn!("Failed to load log entries: {}", e),
        }
    }

    info!("Loaded {} log entries.", entries.len());
    entries
}

/// Load sessions from `chats/*.json` files
///
/// When several files carry the same sessionId, the one with the latest
/// `lastUpdated` is kept; on a tie the first file read stays. The result is
/// ordered by sessionId.
pub fn load_sessions<I, P>(paths: I) -> Vec<Session>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let _span = info_span!("load_sessions").entered();

    let mut sessions: BTreeMap<String, Session> = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        let session = match read_session_file(path) {
            Ok(s) => s,
            Err(e) => {
                error!("Error loading session: {}", e);
                continue;
            }
        };

        let newer = sessions
            .get(&session.session_id)
            .map_or(true, |existing| session.last_updated > existing.last_updated);
        if newer {
            sessions.insert(session.session_id.clone(), session);
        }
    }

    info!("Loaded {} sessions.", sessions.len());
    sessions.into_values().collect()
}

pub(super) fn read_json(path: &Path) -> Result<Value, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse one log file; returns the valid entries and the number skipped
fn read_log_file(path: &Path) -> Result<(Vec<LogEntry>, usize), LoadError> {
    let items = match read_json(path)? {
        Value::Array(items) => items,
        _ => {
            return Err(LoadError::Shape {
                path: path.to_path_buf(),
                expected: "array of log entries",
            })
        }
    };

    let source_file = path_string(path);
    let project_hash = project_hash_from_path(path);

    let mut entries = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match LogEntry::from_value(item) {
            Ok(mut entry) => {
                entry.source_file = Some(source_file.clone());
                entry.project_hash = project_hash.clone();
                entry.user_message_index = Some(entry.message_id);
                entries.push(entry);
            }
            Err(_) => skipped += 1,
        }
    }

    Ok((entries, skipped))
}

fn read_session_file(path: &Path) -> Result<Session, LoadError> {
    let value = read_json(path)?;
    if !value.is_object() {
        return Err(LoadError::Shape {
            path: path.to_path_buf(),
            expected: "session object",
        });
    }
    Session::from_value(value).map_err(|source| LoadError::Validation {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, value: &Value) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
        path
    }

    fn session(id: &str, last_updated: &str, first_content: &str) -> Value {
        json!({
            "sessionId": id,
            "projectHash": "p".repeat(64),
            "startTime": "2025-06-01T10:00:00Z",
            "lastUpdated": last_updated,
            "messages": [
                {"id": "m1", "timestamp": "2025-06-01T10:00:01Z", "type": "user", "content": first_content}
            ]
        })
    }

    fn log(session: &str, message_id: i64, ts: &str, message: &str) -> Value {
        json!({
            "sessionId": session,
            "messageId": message_id,
            "type": "user",
            "message": message,
            "timestamp": ts
        })
    }

    #[test]
    fn test_latest_session_wins() {
        let dir = TempDir::new().unwrap();
        let old = write(dir.path(), "a/chats/old.json", &session("s1", "2025-06-01T10:10:00Z", "old"));
        let new = write(dir.path(), "b/chats/new.json", &session("s1", "2025-06-01T11:00:00Z", "new"));
        let other = write(dir.path(), "b/chats/other.json", &session("s2", "2025-06-01T10:10:00Z", "x"));

        for order in [vec![&old, &new, &other], vec![&new, &other, &old]] {
            let sessions = load_sessions(order);
            assert_eq!(sessions.len(), 2);
            let s1 = sessions.iter().find(|s| s.session_id == "s1").unwrap();
            assert_eq!(s1.messages[0].content.as_text(), "new");
        }
    }

    #[test]
    fn test_session_tie_keeps_first() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a/chats/a.json", &session("s1", "2025-06-01T10:10:00Z", "first"));
        let b = write(dir.path(), "b/chats/b.json", &session("s1", "2025-06-01T10:10:00Z", "second"));
        let sessions = load_sessions([&a, &b]);
        assert_eq!(sessions[0].messages[0].content.as_text(), "first");
    }

    #[test]
    fn test_bad_session_files_are_isolated() {
        let dir = TempDir::new().unwrap();
        let corrupt = dir.path().join("x/chats/corrupt.json");
        fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
        fs::write(&corrupt, "{not json").unwrap();
        let mut missing_id = session("s9", "2025-06-01T10:10:00Z", "x");
        missing_id.as_object_mut().unwrap().remove("sessionId");
        let invalid = write(dir.path(), "x/chats/invalid.json", &missing_id);
        let array = write(dir.path(), "x/chats/array.json", &json!([]));
        let good = write(dir.path(), "x/chats/good.json", &session("s1", "2025-06-01T10:10:00Z", "ok"));
        let absent = dir.path().join("x/chats/absent.json");

        let sessions = load_sessions([corrupt, invalid, array, absent, good]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s1");
    }

    #[test]
    fn test_legacy_tool_result_keeps_session() {
        let dir = TempDir::new().unwrap();
        let mut value = session("s1", "2025-06-01T10:10:00Z", "run it");
        value["messages"][0]["toolCalls"] = json!([
            {"id": "t1", "name": "shell", "result": "plain legacy text", "status": 1}
        ]);
        let path = write(dir.path(), "x/chats/legacy.json", &value);

        let sessions = load_sessions([path]);
        assert_eq!(sessions.len(), 1);
        let call = &sessions[0].messages[0].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.result, Some(vec![json!("plain legacy text")]));
        assert_eq!(call.status, None);
    }

    #[test]
    fn test_all_files_failing_yields_empty() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("nope.json");
        assert!(load_sessions([&absent]).is_empty());
        assert!(load_log_entries([&absent]).is_empty());
    }

    #[test]
    fn test_log_entries_dedup_first_wins_and_derive_fields() {
        let dir = TempDir::new().unwrap();
        let hash = "d".repeat(64);
        let first = write(
            dir.path(),
            &format!("{}/logs.json", hash),
            &json!([
                log("s1", 0, "2025-06-01T10:00:00Z", "first"),
                log("s1", 1, "2025-06-01T10:01:00Z", "second"),
                log("s1", 0, "2025-06-01T10:00:00Z", "duplicate in same file"),
            ]),
        );
        let second = write(
            dir.path(),
            "other/logs.json",
            &json!([
                log("s1", 0, "2025-06-01T10:00:00Z", "duplicate in other file"),
                log("s1", 0, "2025-06-01T10:05:00Z", "same id, new time"),
            ]),
        );

        let entries = load_log_entries([&first, &second]);
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "same id, new time"]);

        assert_eq!(entries[0].project_hash.as_deref(), Some(hash.as_str()));
        assert_eq!(entries[0].source_file.as_deref(), Some(first.to_str().unwrap()));
        assert_eq!(entries[1].user_message_index, Some(1));
        assert_eq!(entries[2].project_hash, None);
    }

    #[test]
    fn test_invalid_log_records_skipped_individually() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "p/logs.json",
            &json!([
                {"sessionId": "s1", "type": "user"},
                log("s1", 3, "2025-06-01T10:00:00Z", "kept"),
                "not a record",
            ]),
        );
        let not_array = write(dir.path(), "q/logs.json", &json!({"sessionId": "s1"}));

        let entries = load_log_entries([&path, &not_array]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }
}
