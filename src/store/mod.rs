//! Snapshot storage for flattened tables
//!
//! The tabular engine is reached only through `TableStore`. Two backends:
//! - SQLite: one `<prefix><table>.sqlite` file per table, queryable by
//!   the analysis pass
//! - JSONL + zstd: one `<prefix><table>.jsonl.zst` file per table

mod jsonl;
mod schema;
mod sqlite;

pub use jsonl::{write_jsonl_zst, JsonlZstSnapshot};
pub use schema::{quote_ident, MANIFEST_SCHEMA};
pub use sqlite::{open_snapshot, snapshot_columns, write_sqlite, SqliteSnapshot};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::normalize::Table;

/// Snapshot file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotFormat {
    #[default]
    Sqlite,
    JsonlZst,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Sqlite => "sqlite",
            SnapshotFormat::JsonlZst => "jsonl.zst",
        }
    }

    /// Format implied by a file name; anything not `.jsonl.zst` is SQLite
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".jsonl.zst") {
            SnapshotFormat::JsonlZst
        } else {
            SnapshotFormat::Sqlite
        }
    }
}

/// What a snapshot write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Narrow interface to the tabular storage engine
pub trait TableStore {
    /// Persist a table, replacing any earlier snapshot of it
    ///
    /// Returns `None` for an empty table, which is not written.
    fn write_table(&mut self, table: &Table) -> Result<Option<SnapshotInfo>>;
}

/// `<dir>/<prefix><table>.<ext>`
pub fn snapshot_path(dir: &Path, prefix: &str, table: &str, format: SnapshotFormat) -> PathBuf {
    dir.join(format!("{}{}.{}", prefix, table, format.extension()))
}

/// Store for the given format writing into `dir`
pub fn open_store(format: SnapshotFormat, dir: &Path, prefix: &str) -> Box<dyn TableStore> {
    match format {
        SnapshotFormat::Sqlite => Box::new(SqliteSnapshot::new(dir, prefix)),
        SnapshotFormat::JsonlZst => Box::new(JsonlZstSnapshot::new(dir, prefix)),
    }
}

/// Write one table to an explicit file, format chosen by its extension
pub fn export_table(table: &Table, path: &Path) -> Result<Option<SnapshotInfo>> {
    if table.is_empty() {
        return Ok(None);
    }
    match SnapshotFormat::from_path(path) {
        SnapshotFormat::Sqlite => write_sqlite(table, path, &uuid::Uuid::new_v4().to_string())?,
        SnapshotFormat::JsonlZst => write_jsonl_zst(table, path)?,
    }
    Ok(Some(SnapshotInfo {
        table: table.name().to_string(),
        path: path.to_path_buf(),
        rows: table.len(),
    }))
}

/// Create the parent directory of a snapshot file and drop any old copy
pub(crate) fn prepare_target(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_path() {
        let path = snapshot_path(Path::new("/out"), "run1_", "messages", SnapshotFormat::Sqlite);
        assert_eq!(path, PathBuf::from("/out/run1_messages.sqlite"));
        let path = snapshot_path(Path::new("/out"), "", "logs", SnapshotFormat::JsonlZst);
        assert_eq!(path, PathBuf::from("/out/logs.jsonl.zst"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SnapshotFormat::from_path(Path::new("out/logs.jsonl.zst")), SnapshotFormat::JsonlZst);
        assert_eq!(SnapshotFormat::from_path(Path::new("messages.sqlite")), SnapshotFormat::Sqlite);
        assert_eq!(SnapshotFormat::from_path(Path::new("messages.db")), SnapshotFormat::Sqlite);
    }

    #[test]
    fn test_export_table_to_named_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut row = crate::normalize::Row::new();
        row.set("id", "m1");
        let table = Table::new("messages", vec![row]);

        let path = dir.path().join("nested").join("my.jsonl.zst");
        let info = export_table(&table, &path).unwrap().unwrap();
        assert_eq!(info.path, path);
        assert!(path.exists());
        assert!(export_table(&Table::empty("messages"), &path).unwrap().is_none());
    }

    #[test]
    fn test_format_from_yaml() {
        let format: SnapshotFormat = serde_yaml::from_str("jsonl-zst").unwrap();
        assert_eq!(format, SnapshotFormat::JsonlZst);
    }
}
