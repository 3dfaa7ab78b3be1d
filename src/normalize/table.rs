//! Flat, scalar-only tables
//!
//! `Cell` has no nested variant: objects and arrays can only enter a row
//! through `Cell::from_value`, which serializes them to compact JSON text.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// A single scalar value in a flat row
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Canonicalize a JSON value into a cell
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map_or(Cell::Null, Cell::Float),
            },
            Value::String(s) => Cell::Text(s.clone()),
            nested => Cell::Text(nested.to_string()),
        }
    }

    /// Serialize any value to a compact JSON text cell
    pub fn serialized<T: Serialize + ?Sized>(value: &T) -> Self {
        serde_json::to_string(value).map_or(Cell::Null, Cell::Text)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// JSON form used by row-oriented snapshots
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => Value::from(*f),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Timestamp(ts) => Value::String(format_timestamp(ts)),
        }
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        Cell::from_value(value)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::from_value(&value)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<usize> for Cell {
    fn from(i: usize) -> Self {
        Cell::Int(i as i64)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(ts: DateTime<Utc>) -> Self {
        Cell::Timestamp(ts)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

const NULL: &Cell = &Cell::Null;

/// One flat row; columns keep insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
    index: HashMap<String, usize>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from a JSON object, serializing nested values
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut row = Row::new();
        for (key, value) in object {
            row.set(key.as_str(), Cell::from_value(value));
        }
        row
    }

    /// Set a column, replacing any existing value in place
    pub fn set(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        let column = column.into();
        let cell = cell.into();
        match self.index.get(&column).copied() {
            Some(i) => self.cells[i].1 = cell,
            None => {
                self.index.insert(column.clone(), self.cells.len());
                self.cells.push((column, cell));
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.index.get(column).map(|&i| &self.cells[i].1)
    }

    /// Like `get`, with missing columns read as `Cell::Null`
    pub fn value(&self, column: &str) -> &Cell {
        self.get(column).unwrap_or(NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A named set of rows with the union of their columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = vec![];
        let mut seen: HashSet<&str> = HashSet::new();
        for row in &rows {
            for (column, _) in row.iter() {
                if seen.insert(column) {
                    columns.push(column.to_string());
                }
            }
        }
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, vec![])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Values of one column; rows without it yield `Cell::Null`
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.rows.iter().map(move |row| row.value(column))
    }
}
