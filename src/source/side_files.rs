//! Side-channel files that are read as loose JSON records
//!
//! Unlike sessions and log entries, these have no schema: every object
//! becomes a row as-is, with its nested values serialized.

use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use super::loader::read_json;
use super::{path_string, project_hash_from_path, FileLister};
use crate::normalize::{Row, Table, CHAT_LOGS, SECURITY_EVENTS, TOOL_OUTPUTS};

/// Load `tool_outputs/<tool>_<suffix>.txt` files holding one JSON record each
///
/// Files larger than `max_file_bytes` are skipped without being read. Only
/// content that, once trimmed, starts with `{` and ends with `}` is parsed;
/// anything that fails to parse into an object is dropped silently.
pub fn load_tool_outputs(
    lister: &dyn FileLister,
    root: &Path,
    max_file_bytes: u64,
) -> Result<Table> {
    let mut rows = vec![];

    for path in lister.tool_output_files(root)? {
        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => continue,
        };
        if size > max_file_bytes {
            debug!("Skipping oversized tool output {} ({} bytes)", path.display(), size);
            continue;
        }

        let Some(mut record) = read_object_file(&path) else {
            continue;
        };
        record.insert("source_file".into(), Value::String(path_string(&path)));
        record.insert("tool_name".into(), Value::String(tool_name_from_path(&path)));
        record.insert(
            "projectHash".into(),
            project_hash_from_path(&path).map_or(Value::Null, Value::String),
        );
        rows.push(Row::from_object(&record));
    }

    info!("Loaded {} tool outputs.", rows.len());
    Ok(Table::new(TOOL_OUTPUTS, rows))
}

/// Load security event dumps
///
/// A JSON array contributes each of its object items, a JSON object
/// contributes itself. Empty and non-JSON files are skipped.
pub fn load_security_events(lister: &dyn FileLister, root: &Path) -> Result<Table> {
    let mut rows = vec![];

    for path in lister.security_event_files(root)? {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let trimmed = bytes.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_slice::<Value>(trimmed) else {
            continue;
        };

        let source_file = Value::String(path_string(&path));
        for mut record in object_records(value) {
            record.insert("source_file".into(), source_file.clone());
            rows.push(Row::from_object(&record));
        }
    }

    info!("Loaded {} security events.", rows.len());
    Ok(Table::new(SECURITY_EVENTS, rows))
}

/// Every object in the given `logs.json` files, without schema validation
///
/// Keeps the records the typed loader would reject, tagged with
/// `source_file` and `_project_hash`.
pub fn load_raw_log_rows<I, P>(paths: I) -> Table
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut rows = vec![];

    for path in paths {
        let path = path.as_ref();
        let Ok(Value::Array(items)) = read_json(path) else {
            continue;
        };
        let source_file = Value::String(path_string(path));
        let project_hash = project_hash_from_path(path).map_or(Value::Null, Value::String);

        for item in items {
            if let Value::Object(mut record) = item {
                record.insert("source_file".into(), source_file.clone());
                record.insert("_project_hash".into(), project_hash.clone());
                rows.push(Row::from_object(&record));
            }
        }
    }

    Table::new(CHAT_LOGS, rows)
}

/// Tool name from `<toolname>_<suffix>.txt`: the file name minus its last
/// underscore-delimited part. Names without an underscore are kept whole.
pub fn tool_name_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.rsplit_once('_') {
        Some((tool, _)) => tool.to_string(),
        None => name,
    }
}

fn read_object_file(path: &Path) -> Option<Map<String, Value>> {
    let bytes = std::fs::read(path).ok()?;
    let trimmed = bytes.trim_ascii();
    if !(trimmed.starts_with(b"{") && trimmed.ends_with(b"}")) {
        return None;
    }
    match serde_json::from_slice::<Value>(trimmed).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn object_records(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Cell;
    use crate::source::GlobLister;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn by_tool<'a>(table: &'a Table, tool: &str) -> Option<&'a Row> {
        table
            .rows()
            .iter()
            .find(|r| r.get("tool_name") == Some(&Cell::Text(tool.into())))
    }

    #[test]
    fn test_tool_outputs_filtering() {
        let dir = TempDir::new().unwrap();
        let hash = "9".repeat(64);
        write(
            dir.path(),
            &format!("{}/tool_outputs/run_shell_command_abc.txt", hash),
            "  {\"stdout\": \"ok\", \"meta\": {\"code\": 0}}\n",
        );
        write(dir.path(), "p/tool_outputs/plain_1.txt", "just text");
        write(dir.path(), "p/tool_outputs/halfjson_1.txt", "{\"a\": 1} trailing");
        write(dir.path(), "p/tool_outputs/broken_1.txt", "{not json}");
        write(dir.path(), "p/tool_outputs/list_1.txt", "[{\"a\": 1}]");

        let table = load_tool_outputs(&GlobLister::default(), dir.path(), 1024).unwrap();
        assert_eq!(table.len(), 1);

        let row = by_tool(&table, "run_shell_command").unwrap();
        assert_eq!(row.get("stdout"), Some(&Cell::Text("ok".into())));
        assert_eq!(row.get("meta"), Some(&Cell::Text(r#"{"code":0}"#.into())));
        assert_eq!(row.get("projectHash"), Some(&Cell::Text(hash)));
    }

    #[test]
    fn test_tool_outputs_size_guard() {
        let dir = TempDir::new().unwrap();
        let big = format!("{{\"data\": \"{}\"}}", "x".repeat(200));
        write(dir.path(), "p/tool_outputs/big_1.txt", &big);
        write(dir.path(), "p/tool_outputs/small_1.txt", "{\"data\": 1}");

        let table = load_tool_outputs(&GlobLister::default(), dir.path(), 100).unwrap();
        assert_eq!(table.len(), 1);
        assert!(by_tool(&table, "small").is_some());
        assert!(by_tool(&table, "big").is_none());
    }

    #[test]
    fn test_tool_name_from_path() {
        assert_eq!(tool_name_from_path(Path::new("/x/read_many_files_17.txt")), "read_many_files");
        assert_eq!(tool_name_from_path(Path::new("/x/grep.txt")), "grep.txt");
    }

    #[test]
    fn test_security_events() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "search_udm_1.txt",
            r#"[{"event": "login", "principal": {"user": "a"}}, 5, {"event": "logout"}]"#,
        );
        write(dir.path(), ".gemini-tmp/alert_events.json", r#"{"event": "alert"}"#);
        write(dir.path(), "search_security_events_2.txt", "   ");
        write(dir.path(), "search_security_events_3.txt", "no json here");

        let table = load_security_events(&GlobLister::default(), dir.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.has_column("source_file"));
        let principals: Vec<_> = table.column("principal").cloned().collect();
        assert!(principals.contains(&Cell::Text(r#"{"user":"a"}"#.into())));
    }

    #[test]
    fn test_raw_log_rows_keep_unvalidated_records() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "p/logs.json",
            r#"[{"sessionId": "s1", "extra": [1]}, "skip", {"messageId": 2}]"#,
        );
        let table = load_raw_log_rows([&path]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].get("extra"), Some(&Cell::Text("[1]".into())));
        assert_eq!(table.rows()[0].get("_project_hash"), Some(&Cell::Null));
    }
}
