//! SQLite schema helpers for snapshot files
//!
//! Each snapshot file holds one data table, created from the columns of the
//! flattened table, plus a `_snapshot` manifest describing the export run.

use std::collections::HashSet;

use crate::normalize::{Cell, Table};

pub const MANIFEST_SCHEMA: &str = r#"
-- One row per export run that wrote this file
CREATE TABLE IF NOT EXISTS _snapshot (
    run_id TEXT NOT NULL,                  -- UUID shared by all files of one export
    table_name TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);
"#;

/// Quote an identifier for use in SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column affinity from the first non-null value of a column
pub fn affinity(table: &Table, column: &str) -> &'static str {
    match table.column(column).find(|cell| !cell.is_null()) {
        Some(Cell::Bool(_)) | Some(Cell::Int(_)) => "INTEGER",
        Some(Cell::Float(_)) => "REAL",
        Some(Cell::Text(_)) => "TEXT",
        Some(Cell::Timestamp(_)) => "DATETIME",
        Some(Cell::Null) | None => "",
    }
}

/// SQL column names for a table, in column order
///
/// SQLite compares identifiers ASCII case-insensitively, so a column that
/// folds to an earlier name gets a `_2`, `_3`, ... suffix.
pub fn sql_columns(table: &Table) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    table
        .columns()
        .iter()
        .map(|column| {
            let mut name = column.clone();
            let mut n = 2;
            while !used.insert(name.to_ascii_lowercase()) {
                name = format!("{}_{}", column, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// CREATE TABLE statement for a flattened table
pub fn create_table_sql(table: &Table) -> String {
    let columns = table
        .columns()
        .iter()
        .zip(sql_columns(table))
        .map(|(column, name)| {
            let affinity = affinity(table, column);
            if affinity.is_empty() {
                quote_ident(&name)
            } else {
                format!("{} {}", quote_ident(&name), affinity)
            }
        })
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!(
        "CREATE TABLE {} (\n    {}\n);",
        quote_ident(table.name()),
        columns
    )
}

/// INSERT statement with one placeholder per column
pub fn insert_sql(table: &Table) -> String {
    let columns = sql_columns(table)
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; table.columns().len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table.name()),
        columns,
        placeholders
    )
}
