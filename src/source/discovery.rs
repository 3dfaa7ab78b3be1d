//! Glob-based file discovery

use anyhow::{Context, Result};
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{DiscoveredFiles, FileLister};

const LOG_PATTERN: &str = "**/logs.json";
const SESSION_PATTERN: &str = "**/chats/*.json";
const TOOL_OUTPUT_PATTERN: &str = "**/tool_outputs/*.txt";
const SECURITY_EVENT_NAMES: &[&str] = &[
    "search_security_events_*.txt",
    "search_udm_*.txt",
    "*_events.json",
];

/// Discovers files under a root and under its hidden working directory
pub struct GlobLister {
    hidden_dir: String,
}

impl GlobLister {
    pub fn new(hidden_dir: impl Into<String>) -> Self {
        Self {
            hidden_dir: hidden_dir.into(),
        }
    }

    /// The root itself plus the hidden working directory, if it exists
    fn search_roots(&self, root: &Path) -> Vec<PathBuf> {
        let mut roots = vec![root.to_path_buf()];
        let hidden = root.join(&self.hidden_dir);
        if hidden.is_dir() {
            roots.push(hidden);
        }
        roots
    }

    fn glob_files(&self, root: &Path, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        let mut found = BTreeSet::new();
        for search_root in self.search_roots(root) {
            let full = format!(
                "{}/{}",
                Pattern::escape(&search_root.to_string_lossy()),
                pattern
            );
            for entry in glob::glob(&full).with_context(|| format!("Invalid glob {}", full))? {
                match entry {
                    Ok(path) if path.is_file() => {
                        found.insert(path);
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Skipping unreadable path: {}", e),
                }
            }
        }
        Ok(found)
    }
}

impl Default for GlobLister {
    fn default() -> Self {
        Self::new(".gemini-tmp")
    }
}

impl FileLister for GlobLister {
    fn discover(&self, root: &Path) -> Result<DiscoveredFiles> {
        info!("Discovering files in {}", root.display());
        let files = DiscoveredFiles {
            log_files: self.glob_files(root, LOG_PATTERN)?,
            session_files: self.glob_files(root, SESSION_PATTERN)?,
        };
        info!(
            "Found {} log files and {} session files.",
            files.log_files.len(),
            files.session_files.len()
        );
        Ok(files)
    }

    fn tool_output_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        self.glob_files(root, TOOL_OUTPUT_PATTERN)
    }

    fn security_event_files(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        let patterns = SECURITY_EVENT_NAMES
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut found = BTreeSet::new();
        for search_root in self.search_roots(root) {
            for entry in WalkDir::new(&search_root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let name = entry.file_name().to_string_lossy();
                if patterns.iter().any(|p| p.matches(&name)) {
                    found.insert(entry.into_path());
                }
            }
        }
        Ok(found)
    }
}
