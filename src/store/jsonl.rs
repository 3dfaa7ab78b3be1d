//! Zstd-compressed JSON Lines snapshot backend

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{prepare_target, snapshot_path, SnapshotFormat, SnapshotInfo, TableStore};
use crate::normalize::Table;

const ZSTD_LEVEL: i32 = 3;

/// Writes each table as one JSON object per line, compressed with zstd
pub struct JsonlZstSnapshot {
    dir: PathBuf,
    prefix: String,
}

impl JsonlZstSnapshot {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        snapshot_path(&self.dir, &self.prefix, table, SnapshotFormat::JsonlZst)
    }
}

impl TableStore for JsonlZstSnapshot {
    fn write_table(&mut self, table: &Table) -> Result<Option<SnapshotInfo>> {
        if table.is_empty() {
            return Ok(None);
        }
        let path = self.path_for(table.name());
        write_jsonl_zst(table, &path)?;
        Ok(Some(SnapshotInfo {
            table: table.name().to_string(),
            path,
            rows: table.len(),
        }))
    }
}

/// Write a table as zstd-compressed JSON Lines at `path`
pub fn write_jsonl_zst(table: &Table, path: &Path) -> Result<()> {
    prepare_target(path)?;

    let file = File::create(path)
        .with_context(|| format!("Failed to create snapshot {}", path.display()))?;
    let mut encoder = zstd::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)?;

    for row in table.rows() {
        // Every column of the table appears on every line
        let object: Map<String, Value> = table
            .columns()
            .iter()
            .map(|column| (column.clone(), row.value(column).to_json()))
            .collect();
        serde_json::to_writer(&mut encoder, &object)?;
        encoder.write_all(b"\n")?;
    }
    encoder.finish()?.flush()?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}
