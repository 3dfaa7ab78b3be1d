//! Aggregations over snapshot tables, executed by SQLite

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ProjectStat, SessionStat, TableSummary, ValueCount};
use crate::store::{quote_ident, snapshot_columns};

/// An opened snapshot with its column list
pub struct Snapshot {
    pub name: String,
    pub conn: Connection,
    pub columns: Vec<String>,
}

impl Snapshot {
    pub fn open(name: &str, conn: Connection) -> rusqlite::Result<Self> {
        let columns = snapshot_columns(&conn, name)?;
        Ok(Self {
            name: name.to_string(),
            conn,
            columns,
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn table(&self) -> String {
        quote_ident(&self.name)
    }

    /// `SUM(tokens_total)` or a NULL literal when tokens were never reported
    fn tokens_sum(&self) -> &'static str {
        if self.has_column("tokens_total") {
            "SUM(tokens_total)"
        } else {
            "NULL"
        }
    }

    pub fn summary(&self) -> rusqlite::Result<TableSummary> {
        let rows: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", self.table()), [], |row| {
                    row.get(0)
                })?;
        let (first, last) = if self.has_column("timestamp") {
            self.conn.query_row(
                &format!("SELECT MIN(timestamp), MAX(timestamp) FROM {}", self.table()),
                [],
                |row| Ok((display(row.get(0)?), display(row.get(1)?))),
            )?
        } else {
            (None, None)
        };
        Ok(TableSummary {
            name: self.name.clone(),
            rows,
            first,
            last,
        })
    }

    /// (session count, avg messages, avg tokens, total tokens)
    pub fn session_totals(&self) -> rusqlite::Result<(i64, f64, Option<f64>, Option<i64>)> {
        self.conn.query_row(
            &format!(
                "SELECT COUNT(*), AVG(n), AVG(t), SUM(t)
                 FROM (SELECT COUNT(id) AS n, {} AS t FROM {} GROUP BY sessionId)",
                self.tokens_sum(),
                self.table()
            ),
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    row.get(2)?,
                    row.get(3)?,
                ))
            },
        )
    }

    /// Sessions with the most messages
    pub fn top_sessions(&self, limit: usize) -> rusqlite::Result<Vec<SessionStat>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT sessionId, MAX(projectHash), COUNT(id), MIN(timestamp), MAX(timestamp), {}
             FROM {}
             GROUP BY sessionId
             ORDER BY COUNT(id) DESC, sessionId
             LIMIT ?",
            self.tokens_sum(),
            self.table()
        ))?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let start = display(row.get(3)?);
            let end = display(row.get(4)?);
            Ok(SessionStat {
                session_id: row.get(0)?,
                project_hash: row.get(1)?,
                message_count: row.get(2)?,
                duration: duration_between(start.as_deref(), end.as_deref()),
                start,
                end,
                total_tokens: row.get(5)?,
                title: None,
            })
        })?;
        rows.collect()
    }

    pub fn project_count(&self) -> rusqlite::Result<i64> {
        self.conn.query_row(
            &format!("SELECT COUNT(DISTINCT projectHash) FROM {}", self.table()),
            [],
            |row| row.get(0),
        )
    }

    /// Projects ordered by session count, or by tokens when `by_tokens`
    pub fn top_projects(&self, limit: usize, by_tokens: bool) -> rusqlite::Result<Vec<ProjectStat>> {
        let order = if by_tokens {
            "total_tokens DESC"
        } else {
            "session_count DESC"
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT projectHash, COUNT(DISTINCT sessionId) AS session_count, COUNT(id),
                    {} AS total_tokens
             FROM {}
             GROUP BY projectHash
             ORDER BY {}, projectHash
             LIMIT ?",
            self.tokens_sum(),
            self.table(),
            order
        ))?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ProjectStat {
                project_hash: row.get(0)?,
                session_count: row.get(1)?,
                message_count: row.get(2)?,
                total_tokens: row.get(3)?,
                latest_session_id: None,
                title: None,
            })
        })?;
        rows.collect()
    }

    /// Session holding the most recent message of a project
    pub fn latest_session(&self, project_hash: Option<&str>) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT sessionId FROM {} WHERE projectHash IS ?
                     ORDER BY timestamp DESC LIMIT 1",
                    self.table()
                ),
                params![project_hash],
                |row| row.get(0),
            )
            .optional()
    }

    /// Occurrences of each value of a column, most frequent first
    pub fn value_counts(&self, column: &str, limit: Option<usize>) -> rusqlite::Result<Vec<ValueCount>> {
        if !self.has_column(column) {
            return Ok(vec![]);
        }
        let column = quote_ident(column);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {col}, COUNT(*) FROM {table} GROUP BY {col} ORDER BY COUNT(*) DESC, {col} LIMIT ?",
            col = column,
            table = self.table()
        ))?;
        let limit = limit.map_or(-1, |l| l as i64);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ValueCount {
                value: display(row.get(0)?),
                count: row.get(1)?,
            })
        })?;
        rows.collect()
    }
}

/// Text form of a stored value
fn display(value: SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Real(f) => Some(f.to_string()),
        SqlValue::Text(s) => Some(s),
        SqlValue::Blob(b) => Some(String::from_utf8_lossy(&b).to_string()),
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn duration_between(start: Option<&str>, end: Option<&str>) -> Option<chrono::Duration> {
    Some(parse_timestamp(end?)? - parse_timestamp(start?)?)
}
