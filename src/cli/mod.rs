//! Command implementations

pub mod analyze;
pub mod export;
pub mod list;
pub mod summarize;

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::source::{
    load_sessions, project_hash_for_dir, DiscoveredFiles, FileLister, GlobLister, Session,
};

/// Shared state for every command
pub struct Context {
    pub config: Config,
    lister: GlobLister,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let lister = GlobLister::new(config.discovery.hidden_dir.clone());
        Self { config, lister }
    }

    pub fn lister(&self) -> &dyn FileLister {
        &self.lister
    }

    pub fn discover(&self, path: &Path) -> Result<DiscoveredFiles> {
        self.lister.discover(path)
    }

    /// Sessions under `path` whose projectHash starts with `project`
    pub fn project_sessions(&self, files: &DiscoveredFiles, project: Option<&str>) -> Vec<Session> {
        let sessions = load_sessions(&files.session_files);
        match project {
            Some(prefix) => sessions
                .into_iter()
                .filter(|s| s.project_hash.starts_with(prefix))
                .collect(),
            None => sessions,
        }
    }
}

/// Project hash prefix from `--project`, or computed from `--project-dir`
pub fn project_filter(project: Option<String>, project_dir: Option<&Path>) -> Result<Option<String>> {
    match (project, project_dir) {
        (Some(prefix), _) => Ok(Some(prefix)),
        (None, Some(dir)) => Ok(Some(project_hash_for_dir(dir)?)),
        (None, None) => Ok(None),
    }
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// At most `max` characters, with `...` appended when cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

pub fn print_header(title: &str) {
    let rule = "=".repeat(title.chars().count());
    println!("\n{}\n{}\n{}", rule, title, rule);
}
