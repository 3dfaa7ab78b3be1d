//! Analyze command implementation

use anyhow::{Context as _, Result};
use std::path::Path;

use super::{print_header, thousands, Context};
use crate::analysis::{run_analysis, AnalysisReport, ValueCount};
use crate::summarize::{format_duration, GeminiSummarizer};

pub async fn run(ctx: &Context, dir: &Path, prefix: &str, titles: bool) -> Result<()> {
    let report = if titles {
        let summarizer = GeminiSummarizer::from_config(&ctx.config.summarizer)
            .context("Cannot create summarizer for titles")?;
        run_analysis(dir, prefix, Some(&summarizer)).await?
    } else {
        run_analysis::<GeminiSummarizer>(dir, prefix, None).await?
    };
    print_report(&report);
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    print_header("General Statistics");
    for table in &report.tables {
        println!("{}: {} rows", table.name, table.rows);
        if let (Some(first), Some(last)) = (&table.first, &table.last) {
            println!("  Range: {} to {}", first, last);
        }
    }
    for table in &report.unreadable {
        println!("{}: could not be read", table);
    }

    if let Some(sessions) = &report.sessions {
        print_header("Session Analysis");
        println!("Total Sessions: {}", sessions.count);
        println!("Avg Messages per Session: {:.2}", sessions.avg_messages);
        if let (Some(avg), Some(total)) = (sessions.avg_tokens, sessions.total_tokens) {
            println!("Avg Tokens per Session: {:.2}", avg);
            println!("Total Tokens Consumed: {}", thousands(total));
        }

        println!("\nTop 5 Longest Sessions (by message count):");
        println!(
            "{:<36} | {:<5} | {:<15} | {:<10} | Title",
            "Session ID", "Msgs", "Duration", "Project"
        );
        println!("{}", "-".repeat(120));
        for session in &sessions.top {
            let duration = session
                .duration
                .map_or("N/A".to_string(), format_duration);
            println!(
                "{:<36} | {:<5} | {:<15} | {:<10} | {}",
                session.session_id,
                session.message_count,
                duration,
                short_hash(session.project_hash.as_deref(), 8),
                session.title.as_deref().unwrap_or("-")
            );
        }
    }

    if let Some(projects) = &report.projects {
        print_header("Project Analysis");
        println!("Total Projects: {}", projects.count);

        println!("\nTop 5 Projects by Session Count:");
        println!(
            "{:<20} | {:<4} | {:<5} | Latest Session Title",
            "Project Hash", "Sess", "Msgs"
        );
        println!("{}", "-".repeat(100));
        for project in &projects.top_by_sessions {
            println!(
                "{:<20} | {:<4} | {:<5} | {}",
                short_hash(project.project_hash.as_deref(), 18),
                project.session_count,
                project.message_count,
                project.title.as_deref().unwrap_or("-")
            );
        }

        if !projects.top_by_tokens.is_empty() {
            println!("\nTop 5 Projects by Token Usage:");
            for project in &projects.top_by_tokens {
                println!(
                    "  {:<20} | {:<4} sessions | {} tokens",
                    short_hash(project.project_hash.as_deref(), 18),
                    project.session_count,
                    project.total_tokens.map_or("-".to_string(), thousands)
                );
            }
        }
    }

    if !report.top_tools.is_empty() {
        print_header("Tool Usage Analysis");
        println!("Top 10 Used Tools:");
        print_counts(&report.top_tools);
        if !report.tool_statuses.is_empty() {
            println!("\nTool Status Breakdown:");
            print_counts(&report.tool_statuses);
        }
    }

    if !report.thought_subjects.is_empty() {
        print_header("Thought Patterns");
        println!("Top 10 Thought Subjects:");
        print_counts(&report.thought_subjects);
    }
}

fn print_counts(counts: &[ValueCount]) {
    for count in counts {
        println!(
            "  {}: {}",
            count.value.as_deref().unwrap_or("(none)"),
            thousands(count.count)
        );
    }
}

fn short_hash(hash: Option<&str>, len: usize) -> String {
    match hash {
        Some(hash) => format!("{}..", hash.chars().take(len).collect::<String>()),
        None => "N/A".to_string(),
    }
}
