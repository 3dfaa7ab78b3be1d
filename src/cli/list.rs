//! List command implementation

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{thousands, truncate, Context};
use crate::normalize::{messages_table, tool_calls_table, Cell, Table};
use crate::source::{Content, Session};
use crate::summarize::format_duration;

const TOP_N: usize = 5;
const DESCRIPTION_CHARS: usize = 80;

pub struct ListOptions {
    pub project: Option<String>,
    pub all: bool,
    pub verbose: bool,
    pub thoughts: bool,
}

pub fn run(ctx: &Context, path: &Path, options: &ListOptions) -> Result<()> {
    let files = ctx.discover(path)?;
    println!(
        "\nFound {} log files and {} session files.",
        files.log_files.len(),
        files.session_files.len()
    );
    if files.session_files.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let mut sessions = ctx.project_sessions(&files, options.project.as_deref());
    if sessions.is_empty() {
        match &options.project {
            Some(project) => println!("No sessions found for project: {}", project),
            None => println!("No sessions found."),
        }
        return Ok(());
    }
    sessions.sort_by_key(|s| s.start_time);

    let messages = messages_table(&sessions);
    if messages.is_empty() {
        println!("Sessions found but no messages parsed.");
        return Ok(());
    }

    print_activity_range(&sessions);
    print_token_usage(&messages);
    print_models(&messages);
    print_tools(&tool_calls_table(&sessions), options.all);
    print_projects(&sessions, options.all);

    if options.verbose || options.thoughts {
        print_history(&sessions, options);
    }
    Ok(())
}

fn print_activity_range(sessions: &[Session]) {
    let timestamps = || {
        sessions
            .iter()
            .flat_map(|s| s.messages.iter().map(|m| m.timestamp))
    };
    if let (Some(min), Some(max)) = (timestamps().min(), timestamps().max()) {
        println!(
            "\nActivity Range: {} to {} ({})",
            min.format("%Y-%m-%d %H:%M:%S"),
            max.format("%Y-%m-%d %H:%M:%S"),
            format_duration(max - min)
        );
    }
}

fn print_token_usage(messages: &Table) {
    println!("\n--- Token Usage ---");
    let token_columns: Vec<&String> = messages
        .columns()
        .iter()
        .filter(|c| c.starts_with("tokens_"))
        .collect();
    if token_columns.is_empty() {
        println!("  No token usage data found.");
        return;
    }
    for column in token_columns {
        let total: i64 = messages.column(column).filter_map(Cell::as_i64).sum();
        if total > 0 {
            println!("  {}: {}", capitalize(column.trim_start_matches("tokens_")), thousands(total));
        }
    }
}

fn print_models(messages: &Table) {
    if !messages.has_column("model") {
        return;
    }
    println!("\n--- Models Used ---");
    for (model, count) in value_counts(messages, "model") {
        println!("  {}: {} messages", model, thousands(count as i64));
    }
}

fn print_tools(tool_calls: &Table, all: bool) {
    if tool_calls.is_empty() {
        return;
    }
    println!("{}", if all { "\n--- All Tools ---" } else { "\n--- Top Tools ---" });
    let counts = value_counts(tool_calls, "name");
    let limit = if all { counts.len() } else { TOP_N };
    for (name, count) in counts.into_iter().take(limit) {
        println!("  {}: {} calls", name, thousands(count as i64));
    }
}

struct ProjectActivity<'a> {
    messages: usize,
    last_activity: Option<DateTime<Utc>>,
    first_prompt: Option<(DateTime<Utc>, &'a Content)>,
}

fn print_projects(sessions: &[Session], all: bool) {
    if all {
        println!("\n--- All Projects (Sorted by Date) ---");
    } else {
        println!("\n--- Recent Projects ---");
    }

    let mut projects: BTreeMap<&str, ProjectActivity> = BTreeMap::new();
    for session in sessions {
        let entry = projects
            .entry(session.project_hash.as_str())
            .or_insert(ProjectActivity {
                messages: 0,
                last_activity: None,
                first_prompt: None,
            });
        for message in &session.messages {
            entry.messages += 1;
            entry.last_activity = entry.last_activity.max(Some(message.timestamp));
            if message.is_user()
                && entry
                    .first_prompt
                    .map_or(true, |(ts, _)| message.timestamp < ts)
            {
                entry.first_prompt = Some((message.timestamp, &message.content));
            }
        }
    }

    let mut ordered: Vec<_> = projects.into_iter().collect();
    ordered.sort_by(|a, b| b.1.last_activity.cmp(&a.1.last_activity));
    if !all {
        ordered.truncate(TOP_N);
    }

    for (hash, activity) in ordered {
        let description = match activity.first_prompt {
            Some((_, content)) => {
                let text = content.as_text().replace('\n', " ").replace('\r', "");
                truncate(&text, DESCRIPTION_CHARS)
            }
            None => "No user prompts found".to_string(),
        };
        let date = activity
            .last_activity
            .map_or("N/A".to_string(), |ts| ts.format("%Y-%m-%d %H:%M").to_string());
        let short: String = hash.chars().take(12).collect();
        println!(
            "  {} | {}... : {:4} msgs | {}",
            date, short, activity.messages, description
        );
    }
}

fn print_history(sessions: &[Session], options: &ListOptions) {
    println!("\n--- Full Conversation History ---");
    for session in sessions {
        println!("\nSession: {}", session.session_id);
        println!("Project: {}", session.project_hash);
        println!("Start Time: {}", session.start_time.format("%Y-%m-%d %H:%M:%S"));
        println!("{}", "-".repeat(60));

        let mut messages: Vec<_> = session.messages.iter().collect();
        messages.sort_by_key(|m| m.timestamp);

        for message in messages {
            let role = if message.is_user() { "USER" } else { "MODEL" };
            if options.verbose {
                println!("[{}] {}:", message.timestamp.format("%Y-%m-%d %H:%M:%S"), role);
                match &message.content {
                    Content::Text(text) => println!("{}", text),
                    Content::Structured(value) => println!("{}", pretty(value)),
                }
            }

            if options.thoughts {
                for thought in message.thoughts.iter().flatten() {
                    if thought.body().is_some() {
                        println!("\nTHOUGHT: {}", thought.text());
                    }
                }
            }

            if options.verbose {
                for call in message.tool_calls.iter().flatten() {
                    println!("\nTOOL CALL: {}", call.name.as_deref().unwrap_or("-"));
                    if let Some(args) = call.args.as_ref().filter(|a| !a.is_empty()) {
                        let args = expand_json(Value::Object(args.clone()));
                        println!("Args: {}", pretty(&args));
                    }
                    if let Some(result) = call.result.as_ref().filter(|r| !r.is_empty()) {
                        let result = expand_json(Value::Array(result.clone()));
                        println!("Output: {}", pretty(&result));
                    }
                }
                println!();
            }
        }
        println!("{}", "=".repeat(60));
    }
}

/// Replace strings that hold JSON documents with the parsed documents
pub fn expand_json(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_json(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_json).collect()),
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(&s) {
                    Ok(parsed) => expand_json(parsed),
                    Err(_) => Value::String(s),
                }
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Non-null text values of a column, most frequent first
fn value_counts(table: &Table, column: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for cell in table.column(column) {
        if let Some(value) = cell.as_str() {
            *counts.entry(value).or_default() += 1;
        }
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
