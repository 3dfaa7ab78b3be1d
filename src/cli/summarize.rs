//! Summarize command implementation

use anyhow::{Context as _, Result};
use std::path::Path;

use super::Context;
use crate::summarize::{summarize_sessions, GeminiSummarizer, Summarizer};

pub async fn run(ctx: &Context, path: &Path, project: &str) -> Result<()> {
    let files = ctx.discover(path)?;
    if files.session_files.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let mut sessions = ctx.project_sessions(&files, Some(project));
    if sessions.is_empty() {
        println!("No sessions found for project: {}", project);
        return Ok(());
    }
    sessions.sort_by_key(|s| s.start_time);

    let summarizer = GeminiSummarizer::from_config(&ctx.config.summarizer)
        .context("Cannot create summarizer")?;
    print_summaries(&sessions, &summarizer).await;
    Ok(())
}

async fn print_summaries<S: Summarizer>(sessions: &[crate::source::Session], summarizer: &S) {
    for outcome in summarize_sessions(sessions, summarizer).await {
        println!("\nSummarizing Session: {}", outcome.session_id);
        match outcome.result {
            Ok(summary) => {
                println!("Title: {}", summary.title);
                println!("Key Points:");
                for point in &summary.key_points {
                    println!("  - {}", point);
                }
                println!("Outcome: {}", summary.outcome);
            }
            Err(e) => println!("Failed to summarize: {}", e),
        }
        println!("{}", "-".repeat(40));
    }
}
