//! Export commands: single tables and full snapshots

use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::{error, info};

use super::Context;
use crate::normalize::{logs_table, messages_table, thoughts_table, tool_calls_table, Table};
use crate::source::{
    load_log_entries, load_raw_log_rows, load_security_events, load_sessions, load_tool_outputs,
};
use crate::store::{export_table, open_store, SnapshotFormat};

/// Export the messages table to `output`
pub fn messages(ctx: &Context, path: &Path, output: &Path) -> Result<()> {
    let files = ctx.discover(path)?;
    let sessions = load_sessions(&files.session_files);
    let table = messages_table(&sessions);
    write_single(&table, output, "messages")
}

/// Export the log entries table to `output`
pub fn logs(ctx: &Context, path: &Path, output: &Path) -> Result<()> {
    let files = ctx.discover(path)?;
    let entries = load_log_entries(&files.log_files);
    let table = logs_table(&entries);
    write_single(&table, output, "log entries")
}

fn write_single(table: &Table, output: &Path, what: &str) -> Result<()> {
    match export_table(table, output)
        .with_context(|| format!("Failed to export {}", output.display()))?
    {
        Some(info) => println!("Exported {} {} to {}", info.rows, what, info.path.display()),
        None => println!("No {} found, nothing written.", what),
    }
    Ok(())
}

/// Export every table to `<out_dir>/<prefix><table>.<ext>`
pub fn all(
    ctx: &Context,
    path: &Path,
    out_dir: &Path,
    prefix: &str,
    format: SnapshotFormat,
) -> Result<()> {
    let files = ctx.discover(path)?;
    if files.log_files.is_empty() && files.session_files.is_empty() {
        println!("No log or session files found under {}.", path.display());
    }

    let mut tables = vec![];

    let entries = load_log_entries(&files.log_files);
    tables.push(logs_table(&entries));

    let sessions = load_sessions(&files.session_files);
    tables.push(messages_table(&sessions));
    tables.push(tool_calls_table(&sessions));
    tables.push(thoughts_table(&sessions));

    let max_bytes = ctx.config.tool_outputs.max_file_bytes;
    tables.push(load_tool_outputs(ctx.lister(), path, max_bytes)?);
    tables.push(load_security_events(ctx.lister(), path)?);
    tables.push(load_raw_log_rows(&files.log_files));

    let mut store = open_store(format, out_dir, prefix);
    let mut written = 0;
    for table in &tables {
        match store.write_table(table) {
            Ok(Some(snapshot)) => {
                println!("Saved {} ({} rows)", snapshot.path.display(), snapshot.rows);
                written += 1;
            }
            Ok(None) => println!("Skipped {} (no rows)", table.name()),
            Err(e) => {
                error!("Failed to write {}: {:#}", table.name(), e);
                println!("Failed {} ({:#})", table.name(), e);
            }
        }
    }
    info!("Exported {} of {} tables to {}", written, tables.len(), out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{open_snapshot, snapshot_path};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(root: &Path) {
        let project = root.join("f".repeat(64));
        fs::create_dir_all(project.join("chats")).unwrap();
        fs::create_dir_all(project.join("tool_outputs")).unwrap();
        let session = json!({
            "sessionId": "s1",
            "projectHash": "f".repeat(64),
            "startTime": "2025-06-01T10:00:00Z",
            "lastUpdated": "2025-06-01T10:10:00Z",
            "messages": [
                {"id": "m1", "timestamp": "2025-06-01T10:00:00Z", "type": "user", "content": "hi"},
                {
                    "id": "m2", "timestamp": "2025-06-01T10:01:00Z", "type": "gemini",
                    "content": "ok",
                    "toolCalls": [{"id": "t1", "name": "ls", "args": {"dir": "."}}]
                }
            ]
        });
        fs::write(project.join("chats/session-1.json"), session.to_string()).unwrap();
        let logs = json!([
            {"sessionId": "s1", "messageId": 0, "type": "user", "message": "hi",
             "timestamp": "2025-06-01T10:00:00Z"}
        ]);
        fs::write(project.join("logs.json"), logs.to_string()).unwrap();
        fs::write(project.join("tool_outputs/ls_1.txt"), r#"{"files": ["a"]}"#).unwrap();
    }

    #[test]
    fn test_export_all_writes_non_empty_tables() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_fixture(root.path());

        let ctx = Context::new(Config::default());
        all(&ctx, root.path(), out.path(), "run_", SnapshotFormat::Sqlite).unwrap();

        for table in ["logs", "messages", "tool_calls", "tool_outputs", "chat_logs"] {
            let path = snapshot_path(out.path(), "run_", table, SnapshotFormat::Sqlite);
            assert!(path.exists(), "missing {}", table);
        }
        for table in ["thoughts", "security_events"] {
            let path = snapshot_path(out.path(), "run_", table, SnapshotFormat::Sqlite);
            assert!(!path.exists(), "unexpected {}", table);
        }

        let conn = open_snapshot(&snapshot_path(out.path(), "run_", "tool_calls", SnapshotFormat::Sqlite))
            .unwrap();
        let arg: String = conn
            .query_row("SELECT arg_dir FROM tool_calls", [], |r| r.get(0))
            .unwrap();
        assert_eq!(arg, ".");
    }

    #[test]
    fn test_export_all_with_case_variant_keys() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_fixture(root.path());
        let outputs = root.path().join("f".repeat(64)).join("tool_outputs");
        fs::write(outputs.join("a_1.txt"), r#"{"output": "x"}"#).unwrap();
        fs::write(outputs.join("b_1.txt"), r#"{"Output": "y"}"#).unwrap();

        let chat = root.path().join("f".repeat(64)).join("chats/session-2.json");
        let session = json!({
            "sessionId": "s2",
            "projectHash": "f".repeat(64),
            "startTime": "2025-06-02T10:00:00Z",
            "lastUpdated": "2025-06-02T10:10:00Z",
            "messages": [{
                "id": "m1", "timestamp": "2025-06-02T10:00:00Z", "type": "gemini", "content": "",
                "toolCalls": [
                    {"id": "t1", "name": "grep", "args": {"Path": "a", "path": "b"}},
                    {"id": "t2", "name": "grep", "args": {"PATH": "c"}}
                ]
            }]
        });
        fs::write(&chat, session.to_string()).unwrap();

        let ctx = Context::new(Config::default());
        all(&ctx, root.path(), out.path(), "", SnapshotFormat::Sqlite).unwrap();

        let outputs = open_snapshot(&snapshot_path(out.path(), "", "tool_outputs", SnapshotFormat::Sqlite))
            .unwrap();
        let column = |sql: &str| -> Option<String> { outputs.query_row(sql, [], |r| r.get(0)).unwrap() };
        assert_eq!(column("SELECT output FROM tool_outputs WHERE tool_name = 'a'").as_deref(), Some("x"));
        assert_eq!(column("SELECT Output_2 FROM tool_outputs WHERE tool_name = 'a'"), None);
        assert_eq!(column("SELECT Output_2 FROM tool_outputs WHERE tool_name = 'b'").as_deref(), Some("y"));

        let calls = open_snapshot(&snapshot_path(out.path(), "", "tool_calls", SnapshotFormat::Sqlite))
            .unwrap();
        let columns = crate::store::snapshot_columns(&calls, "tool_calls").unwrap();
        for name in ["arg_Path", "arg_path_2", "arg_PATH_3"] {
            assert!(columns.iter().any(|c| c == name), "missing {}", name);
        }
        let value = |sql: &str| -> Option<String> { calls.query_row(sql, [], |r| r.get(0)).unwrap() };
        assert_eq!(value("SELECT arg_Path FROM tool_calls WHERE id = 't1'").as_deref(), Some("a"));
        assert_eq!(value("SELECT arg_path_2 FROM tool_calls WHERE id = 't1'").as_deref(), Some("b"));
        assert_eq!(value("SELECT arg_PATH_3 FROM tool_calls WHERE id = 't2'").as_deref(), Some("c"));

        for table in ["logs", "messages", "chat_logs"] {
            assert!(snapshot_path(out.path(), "", table, SnapshotFormat::Sqlite).exists());
        }
    }

    #[test]
    fn test_export_all_continues_past_failed_table() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_fixture(root.path());
        // a directory where the logs snapshot should go cannot be replaced
        fs::create_dir_all(out.path().join("logs.sqlite/blocked")).unwrap();

        let ctx = Context::new(Config::default());
        all(&ctx, root.path(), out.path(), "", SnapshotFormat::Sqlite).unwrap();

        for table in ["messages", "tool_calls", "tool_outputs", "chat_logs"] {
            let path = snapshot_path(out.path(), "", table, SnapshotFormat::Sqlite);
            assert!(path.is_file(), "missing {}", table);
        }
    }

    #[test]
    fn test_export_messages_to_named_file() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_fixture(root.path());

        let ctx = Context::new(Config::default());
        let output = out.path().join("messages.jsonl.zst");
        messages(&ctx, root.path(), &output).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn test_export_with_no_files_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let ctx = Context::new(Config::default());
        logs(&ctx, root.path(), &out.path().join("logs.sqlite")).unwrap();
        all(&ctx, root.path(), out.path(), "", SnapshotFormat::JsonlZst).unwrap();
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
