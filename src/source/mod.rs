//! Log sources: file discovery, typed records and loaders
//!
//! Data layout written by the assistant:
//!   - <root>/**/<project_hash>/logs.json          - array of log entries
//!   - <root>/**/<project_hash>/chats/*.json       - one session per file
//!   - <root>/**/tool_outputs/<tool>_<suffix>.txt  - one JSON record per file
//!   - search_security_events_*.txt, search_udm_*.txt, *_events.json
//!
//! The same layout may also live under a hidden working directory
//! (`.gemini-tmp` by default), which is searched explicitly.

mod discovery;
mod loader;
mod records;
mod side_files;

pub use discovery::GlobLister;
pub use loader::{load_log_entries, load_sessions};
pub use records::{Content, LogEntry, Message, Session, Thought, TokenUsage, ToolCall, USER_TYPE};
pub use side_files::{load_raw_log_rows, load_security_events, load_tool_outputs};

use anyhow::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Length of the hex digest the assistant uses as a project directory name
pub const PROJECT_HASH_LEN: usize = 64;

/// Files found under a root directory, de-duplicated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredFiles {
    pub log_files: BTreeSet<PathBuf>,
    pub session_files: BTreeSet<PathBuf>,
}

/// File discovery seam
///
/// Implementations list candidate paths only; they never open or validate
/// the files they return.
pub trait FileLister {
    /// `logs.json` and `chats/*.json` files under `root`
    fn discover(&self, root: &Path) -> Result<DiscoveredFiles>;

    /// `tool_outputs/*.txt` side files under `root`
    fn tool_output_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>>;

    /// Security event dumps under `root`
    fn security_event_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>>;
}

/// A record that does not fit its entity schema
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("record does not match {entity} schema: {source}")]
    Schema {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("session {session_id}: lastUpdated {last_updated} precedes startTime {start_time}")]
    TimeOrder {
        session_id: String,
        start_time: DateTime<Utc>,
        last_updated: DateTime<Utc>,
    },
}

/// Failure to load one file; callers log it and move on
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected top-level shape in {}: expected {}", .path.display(), .expected)]
    Shape { path: PathBuf, expected: &'static str },

    #[error("{}: {}", .path.display(), .source)]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// Project identifier guessed from a file path
///
/// Any path component exactly 64 characters long is taken as the project
/// hash; the first match wins. This is a naming heuristic, not a hash check.
pub fn project_hash_from_path(path: &Path) -> Option<String> {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .find(|part| part.chars().count() == PROJECT_HASH_LEN)
        .map(String::from)
}

/// Project hash the assistant derives for a project root directory
///
/// Lowercase hex SHA-256 of the absolute directory path.
pub fn project_hash_for_dir(dir: &Path) -> Result<String> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    Ok(hex::encode(digest))
}

/// Display path the way the assistant's own tools print it
pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
