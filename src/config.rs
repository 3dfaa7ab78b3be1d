//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::SnapshotFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub tool_outputs: ToolOutputsConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Where log files are looked for besides the root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_hidden_dir")]
    pub hidden_dir: String,
}

/// Tool-output side files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutputsConfig {
    /// Files larger than this are skipped without being read
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

/// Summarization service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// Write to a dated file instead of stderr
    #[serde(default = "default_enabled")]
    pub to_file: bool,
}

/// Snapshot export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: SnapshotFormat,
}

// Default value functions
fn default_hidden_dir() -> String {
    ".gemini-tmp".to_string()
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    ".".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hidden_dir: default_hidden_dir(),
        }
    }
}

impl Default for ToolOutputsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: default_log_directory(),
            to_file: true,
        }
    }
}

impl SummarizerConfig {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl LoggingConfig {
    /// Log directory, expanding ~ to home directory
    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.directory).to_string())
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./gemini-lens.yaml (current directory)
    /// 3. ~/.config/gemini-lens/gemini-lens.yaml
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut search_paths = vec![];
        if let Some(path) = path {
            search_paths.push(shellexpand::tilde(path).to_string());
        }
        search_paths.push("gemini-lens.yaml".to_string());
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(
                config_dir
                    .join("gemini-lens")
                    .join("gemini-lens.yaml")
                    .to_string_lossy()
                    .to_string(),
            );
        }

        for search_path in &search_paths {
            if Path::new(search_path).exists() {
                return Self::from_file(Path::new(search_path));
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn api_key(&self) -> Option<String> {
        self.summarizer.api_key()
    }
}
