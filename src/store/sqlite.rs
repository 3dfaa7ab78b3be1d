//! SQLite snapshot backend

use anyhow::{Context, Result};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, ToSql};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::schema::{create_table_sql, insert_sql, quote_ident, MANIFEST_SCHEMA};
use super::{prepare_target, snapshot_path, SnapshotFormat, SnapshotInfo, TableStore};
use crate::normalize::{format_timestamp, Cell, Table};

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Owned(SqlValue::Null),
            Cell::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Cell::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Cell::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Cell::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(ts))),
        })
    }
}

/// Writes each table to its own SQLite file
pub struct SqliteSnapshot {
    dir: PathBuf,
    prefix: String,
    run_id: String,
}

impl SqliteSnapshot {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Identifier shared by every file this store writes
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        snapshot_path(&self.dir, &self.prefix, table, SnapshotFormat::Sqlite)
    }
}

impl TableStore for SqliteSnapshot {
    fn write_table(&mut self, table: &Table) -> Result<Option<SnapshotInfo>> {
        if table.is_empty() {
            return Ok(None);
        }
        let path = self.path_for(table.name());
        write_sqlite(table, &path, &self.run_id)?;
        Ok(Some(SnapshotInfo {
            table: table.name().to_string(),
            path,
            rows: table.len(),
        }))
    }
}

/// Write a table and its manifest row into a fresh SQLite file at `path`
pub fn write_sqlite(table: &Table, path: &Path, run_id: &str) -> Result<()> {
    prepare_target(path)?;

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to create snapshot {}", path.display()))?;
    conn.execute_batch(MANIFEST_SCHEMA)?;

    let tx = conn.transaction()?;
    tx.execute_batch(&create_table_sql(table))?;
    {
        let mut stmt = tx.prepare(&insert_sql(table))?;
        for row in table.rows() {
            let values = table.columns().iter().map(|column| row.value(column));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.execute(
        "INSERT INTO _snapshot (run_id, table_name, row_count, created_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![run_id, table.name(), table.len() as i64],
    )?;
    tx.commit()?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Open an existing snapshot file read-only
pub fn open_snapshot(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open snapshot {}", path.display()))
}

/// Column names of a snapshot table
pub fn snapshot_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
