use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gemini_lens::cli::list::ListOptions;
use gemini_lens::cli::{analyze, export, list, project_filter, summarize, Context};
use gemini_lens::config::Config;
use gemini_lens::logging::LogContext;
use gemini_lens::store::SnapshotFormat;

#[derive(Parser)]
#[command(name = "gemini-lens")]
#[command(about = "Gemini CLI log analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List sessions and show a detailed summary
    List {
        /// Path to search for logs
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Filter by project hash (prefix matches)
        #[arg(long)]
        project: Option<String>,

        /// Filter by project directory instead of hash
        #[arg(long, conflicts_with = "project")]
        project_dir: Option<PathBuf>,

        /// List all projects and tools, not just the top 5
        #[arg(long)]
        all: bool,

        /// Include full conversation history
        #[arg(long)]
        verbose: bool,

        /// Show model thoughts
        #[arg(long = "thought")]
        thoughts: bool,
    },

    /// Export messages to a snapshot file
    Export {
        /// Path to search for logs
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Output file (.sqlite or .jsonl.zst)
        #[arg(long, default_value = "messages.sqlite")]
        output: PathBuf,
    },

    /// Export log entries to a snapshot file
    ExportLogs {
        /// Path to search for logs
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Output file (.sqlite or .jsonl.zst)
        #[arg(long, default_value = "logs.sqlite")]
        output: PathBuf,
    },

    /// Export all tables (logs, messages, tool_calls, thoughts, tool_outputs, security_events, chat_logs)
    ExportAll {
        /// Path to search for logs
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Prefix for output files
        #[arg(long, default_value = "")]
        prefix: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Snapshot format (defaults to the configured one)
        #[arg(long, value_enum)]
        format: Option<SnapshotFormat>,
    },

    /// Use AI to summarize sessions for a specific project
    Summarize {
        /// Path to search for logs
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Filter by project hash (prefix matches)
        #[arg(long)]
        project: String,
    },

    /// Analyze exported SQLite snapshots
    Analyze {
        /// Directory holding the snapshots
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Prefix the snapshots were exported with
        #[arg(long, default_value = "")]
        prefix: String,

        /// Generate AI titles for the top sessions
        #[arg(long)]
        titles: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using default configuration", e);
        Config::default()
    });

    let _logging = match LogContext::init(&config.logging) {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    let ctx = Context::new(config);

    match cli.command {
        Commands::List {
            path,
            project,
            project_dir,
            all,
            verbose,
            thoughts,
        } => {
            let options = ListOptions {
                project: project_filter(project, project_dir.as_deref())?,
                all,
                verbose,
                thoughts,
            };
            list::run(&ctx, &path, &options)?;
        }
        Commands::Export { path, output } => {
            export::messages(&ctx, &path, &output)?;
        }
        Commands::ExportLogs { path, output } => {
            export::logs(&ctx, &path, &output)?;
        }
        Commands::ExportAll {
            path,
            prefix,
            out_dir,
            format,
        } => {
            let format = format.unwrap_or(ctx.config.export.format);
            export::all(&ctx, &path, &out_dir, &prefix, format)?;
        }
        Commands::Summarize { path, project } => {
            summarize::run(&ctx, &path, &project).await?;
        }
        Commands::Analyze {
            path,
            prefix,
            titles,
        } => {
            analyze::run(&ctx, &path, &prefix, titles).await?;
        }
    }

    Ok(())
}
