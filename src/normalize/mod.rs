//! Flattening of sessions and log entries into analytical tables
//!
//! Tables produced from the session set:
//! - messages:   one row per message
//! - tool_calls: one row per tool call, with `arg_*` columns
//! - thoughts:   one row per thought
//!
//! Every derived row keeps its back-references (sessionId, projectHash,
//! messageIndex, userMessageIndex) so the nesting can be reconstructed.

mod calls;
mod messages;
mod table;

pub use calls::{thoughts_table, tool_calls_table};
pub use messages::{content_summary, messages_table, SUMMARY_MAX_CHARS};
pub use table::{format_timestamp, Cell, Row, Table};

use crate::source::{LogEntry, Message, Session};

pub const MESSAGES: &str = "messages";
pub const LOGS: &str = "logs";
pub const TOOL_CALLS: &str = "tool_calls";
pub const THOUGHTS: &str = "thoughts";
pub const TOOL_OUTPUTS: &str = "tool_outputs";
pub const SECURITY_EVENTS: &str = "security_events";
pub const CHAT_LOGS: &str = "chat_logs";

/// A message together with its position in the owning session
#[derive(Debug, Clone, Copy)]
pub struct MessagePosition<'a> {
    pub session: &'a Session,
    pub message: &'a Message,
    /// Chronological index within the session
    pub index: usize,
    /// Number of user messages before this one; only set on user messages
    pub user_index: Option<usize>,
}

/// Walk a session's messages in order, counting user turns
pub fn positions(session: &Session) -> impl Iterator<Item = MessagePosition<'_>> {
    session
        .messages
        .iter()
        .enumerate()
        .scan(0usize, move |user_turns, (index, message)| {
            let user_index = if message.is_user() {
                let current = *user_turns;
                *user_turns += 1;
                Some(current)
            } else {
                None
            };
            Some(MessagePosition {
                session,
                message,
                index,
                user_index,
            })
        })
}

/// One row per log entry, derived fields included
pub fn logs_table(entries: &[LogEntry]) -> Table {
    let rows = entries
        .iter()
        .map(|entry| {
            let mut row = Row::new();
            row.set("sessionId", entry.session_id.as_str());
            row.set("messageId", entry.message_id);
            row.set("type", entry.kind.as_str());
            row.set("message", entry.message.as_str());
            row.set("timestamp", entry.timestamp);
            row.set("source_file", entry.source_file.as_deref());
            row.set("projectHash", entry.project_hash.as_deref());
            row.set("userMessageIndex", entry.user_message_index);
            row
        })
        .collect();
    Table::new(LOGS, rows)
}

/// Back-reference columns shared by tool-call and thought rows
fn set_back_references(row: &mut Row, position: &MessagePosition<'_>) {
    row.set("sessionId", position.session.session_id.as_str());
    row.set("messageId", position.message.id.as_str());
    row.set("messageTimestamp", position.message.timestamp);
    row.set("projectHash", position.session.project_hash.as_str());
    row.set("messageIndex", position.index);
    row.set("userMessageIndex", position.user_index);
}
