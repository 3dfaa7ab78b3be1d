//! Bulk analysis over exported SQLite snapshots
//!
//! Reads whichever of the `chat_logs`, `logs`, `messages`, `thoughts` and
//! `tool_calls` snapshots exist under a directory and prefix. Finding none
//! of them is an error: it means the path or prefix is wrong.

mod queries;
mod reconstruct;

pub use reconstruct::reconstruct_session;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::normalize::{CHAT_LOGS, LOGS, MESSAGES, THOUGHTS, TOOL_CALLS};
use crate::source::Session;
use crate::store::{open_snapshot, snapshot_path, SnapshotFormat};
use crate::summarize::{build_transcript, Summarizer};
use queries::Snapshot;

/// Snapshot tables read by the analysis, in report order
pub const ANALYZED_TABLES: [&str; 5] = [CHAT_LOGS, LOGS, MESSAGES, THOUGHTS, TOOL_CALLS];

const TOP_SESSIONS: usize = 5;
const TOP_PROJECTS: usize = 5;
const TOP_TOOLS: usize = 10;
const TOP_SUBJECTS: usize = 10;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no snapshot files found in {} with prefix '{}'", .dir.display(), .prefix)]
    NoSnapshots { dir: PathBuf, prefix: String },

    #[error("snapshot query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Row count and timestamp range of one snapshot table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub name: String,
    pub rows: i64,
    pub first: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStat {
    pub session_id: String,
    pub project_hash: Option<String>,
    pub message_count: i64,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration: Option<chrono::Duration>,
    pub total_tokens: Option<i64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub count: i64,
    pub avg_messages: f64,
    pub avg_tokens: Option<f64>,
    pub total_tokens: Option<i64>,
    /// Longest sessions by message count
    pub top: Vec<SessionStat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStat {
    pub project_hash: Option<String>,
    pub session_count: i64,
    pub message_count: i64,
    pub total_tokens: Option<i64>,
    pub latest_session_id: Option<String>,
    /// Title of the latest session
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStats {
    pub count: i64,
    pub top_by_sessions: Vec<ProjectStat>,
    /// Empty when no token usage was recorded
    pub top_by_tokens: Vec<ProjectStat>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCount {
    pub value: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub tables: Vec<TableSummary>,
    /// Tables whose file exists but could not be opened
    pub unreadable: Vec<String>,
    pub sessions: Option<SessionStats>,
    pub projects: Option<ProjectStats>,
    pub top_tools: Vec<ValueCount>,
    pub tool_statuses: Vec<ValueCount>,
    pub thought_subjects: Vec<ValueCount>,
}

/// Analyze the snapshots `<dir>/<prefix><table>.sqlite`
///
/// With a summarizer, the top sessions and the latest session of each top
/// project get an AI title. A failed title reads `Error: <reason>` and does
/// not abort the analysis.
pub async fn run_analysis<S: Summarizer>(
    dir: &Path,
    prefix: &str,
    titles: Option<&S>,
) -> Result<AnalysisReport, AnalysisError> {
    let mut snapshots: HashMap<&str, Snapshot> = HashMap::new();
    let mut report = AnalysisReport::default();
    let mut any_found = false;

    for table in ANALYZED_TABLES {
        let path = snapshot_path(dir, prefix, table, SnapshotFormat::Sqlite);
        if !path.exists() {
            continue;
        }
        any_found = true;
        let opened = open_snapshot(&path)
            .and_then(|conn| Snapshot::open(table, conn).map_err(anyhow::Error::from));
        match opened {
            Ok(snapshot) => {
                snapshots.insert(table, snapshot);
            }
            Err(e) => {
                error!("Error loading {}: {:#}", path.display(), e);
                report.unreadable.push(table.to_string());
            }
        }
    }

    if !any_found {
        return Err(AnalysisError::NoSnapshots {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        });
    }
    info!("Analyzing {} snapshot tables", snapshots.len());

    for table in ANALYZED_TABLES {
        if let Some(snapshot) = snapshots.get(table) {
            report.tables.push(snapshot.summary()?);
        }
    }

    let mut to_title: Vec<Session> = vec![];
    if let Some(messages) = snapshots.get(MESSAGES) {
        let (count, avg_messages, avg_tokens, total_tokens) = messages.session_totals()?;
        report.sessions = Some(SessionStats {
            count,
            avg_messages,
            avg_tokens,
            total_tokens,
            top: messages.top_sessions(TOP_SESSIONS)?,
        });

        let mut top_by_sessions = messages.top_projects(TOP_PROJECTS, false)?;
        for project in &mut top_by_sessions {
            project.latest_session_id = messages.latest_session(project.project_hash.as_deref())?;
        }
        let top_by_tokens = if messages.has_column("tokens_total") {
            messages.top_projects(TOP_PROJECTS, true)?
        } else {
            vec![]
        };
        report.projects = Some(ProjectStats {
            count: messages.project_count()?,
            top_by_sessions,
            top_by_tokens,
        });

        if titles.is_some() {
            to_title = sessions_to_title(messages, &report)?;
        }
    }

    if let Some(tool_calls) = snapshots.get(TOOL_CALLS) {
        report.top_tools = tool_calls.value_counts("name", Some(TOP_TOOLS))?;
        report.tool_statuses = tool_calls.value_counts("status", None)?;
    }
    if let Some(thoughts) = snapshots.get(THOUGHTS) {
        report.thought_subjects = thoughts.value_counts("subject", Some(TOP_SUBJECTS))?;
    }
    drop(snapshots);

    if let Some(summarizer) = titles {
        let titled = generate_titles(&to_title, summarizer).await;
        apply_titles(&mut report, &titled);
    }

    Ok(report)
}

/// Sessions referenced by the report, rebuilt from the messages snapshot
fn sessions_to_title(
    messages: &Snapshot,
    report: &AnalysisReport,
) -> Result<Vec<Session>, AnalysisError> {
    let mut ids: Vec<&str> = vec![];
    if let Some(sessions) = &report.sessions {
        ids.extend(sessions.top.iter().map(|s| s.session_id.as_str()));
    }
    if let Some(projects) = &report.projects {
        ids.extend(
            projects
                .top_by_sessions
                .iter()
                .filter_map(|p| p.latest_session_id.as_deref()),
        );
    }
    ids.sort_unstable();
    ids.dedup();

    let mut sessions = vec![];
    for id in ids {
        if let Some(session) = reconstruct_session(&messages.conn, id)? {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

async fn generate_titles<S: Summarizer>(
    sessions: &[Session],
    summarizer: &S,
) -> HashMap<String, String> {
    let mut titles = HashMap::new();
    for session in sessions {
        let title = match summarizer.summarize(&build_transcript(session)).await {
            Ok(summary) => summary.title,
            Err(e) => {
                warn!("Error summarizing session {}: {}", session.session_id, e);
                format!("Error: {}", e)
            }
        };
        titles.insert(session.session_id.clone(), title);
    }
    titles
}

fn apply_titles(report: &mut AnalysisReport, titles: &HashMap<String, String>) {
    let lookup = |id: &str| {
        titles
            .get(id)
            .cloned()
            .unwrap_or_else(|| "N/A (Not found)".to_string())
    };
    if let Some(sessions) = &mut report.sessions {
        for session in &mut sessions.top {
            session.title = Some(lookup(&session.session_id));
        }
    }
    if let Some(projects) = &mut report.projects {
        for project in &mut projects.top_by_sessions {
            project.title = project.latest_session_id.as_deref().map(lookup);
        }
    }
}
