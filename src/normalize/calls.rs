//! Tool-call and thought tables

use super::{positions, set_back_references, Cell, Row, Table, THOUGHTS, TOOL_CALLS};
use crate::source::Session;

/// One row per tool call, with each argument exploded into `arg_<name>`
pub fn tool_calls_table(sessions: &[Session]) -> Table {
    let mut rows = vec![];

    for session in sessions {
        for position in positions(session) {
            let Some(calls) = &position.message.tool_calls else {
                continue;
            };

            for call in calls {
                let mut row = Row::new();
                row.set("id", call.id.as_str());
                row.set("name", call.name.as_deref());
                row.set("displayName", call.display_name.as_deref());
                row.set("description", call.description.as_deref());
                row.set("args", call.args.as_ref().map_or(Cell::Null, Cell::serialized));
                row.set("result", call.result.as_ref().map_or(Cell::Null, Cell::serialized));
                row.set("output", call.output.as_ref().map_or(Cell::Null, Cell::from_value));
                row.set("status", call.status.as_deref());
                row.set("timestamp", call.timestamp);
                row.set(
                    "resultDisplay",
                    call.result_display.as_ref().map_or(Cell::Null, Cell::from_value),
                );

                set_back_references(&mut row, &position);

                if let Some(args) = &call.args {
                    for (name, value) in args {
                        row.set(format!("arg_{}", name), Cell::from_value(value));
                    }
                }

                if let Some(result) = call.result.as_ref().filter(|r| !r.is_empty()) {
                    row.set("result_raw", Cell::serialized(result));
                }

                rows.push(row);
            }
        }
    }

    Table::new(TOOL_CALLS, rows)
}

/// One row per thought
pub fn thoughts_table(sessions: &[Session]) -> Table {
    let mut rows = vec![];

    for session in sessions {
        for position in positions(session) {
            let Some(thoughts) = &position.message.thoughts else {
                continue;
            };

            for thought in thoughts {
                let mut row = Row::new();
                row.set("subject", thought.subject.as_deref());
                row.set("description", thought.description.as_deref());
                row.set("thought", thought.thought.as_deref());
                row.set("timestamp", thought.timestamp);
                set_back_references(&mut row, &position);
                rows.push(row);
            }
        }
    }

    Table::new(THOUGHTS, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fixtures::{message, session};
    use serde_json::json;

    fn tool_session() -> Session {
        let mut reply = message("m2", "gemini", json!(""));
        reply["toolCalls"] = json!([
            {
                "id": "call-1",
                "name": "read_file",
                "args": {"path": "src/lib.rs", "limit": 10, "opts": {"raw": true}, "paths": ["a", "b"]},
                "result": [{"functionResponse": {"id": "call-1", "response": {"output": "ok"}}}],
                "status": "success",
                "timestamp": "2025-06-01T10:00:05Z",
                "resultDisplay": "ok"
            },
            {"id": "call-2", "name": "glob", "result": []}
        ]);
        reply["thoughts"] = json!([{"subject": "Look", "description": "check lib"}]);

        let mut user = message("m1", "user", json!("read lib.rs"));
        user["thoughts"] = json!([{"thought": "odd but tolerated"}]);

        session("s1", json!([user, reply]))
    }

    #[test]
    fn test_tool_call_rows_and_args() {
        let table = tool_calls_table(&[tool_session()]);
        assert_eq!(table.len(), 2);

        let row = &table.rows()[0];
        assert_eq!(row.get("arg_path"), Some(&Cell::Text("src/lib.rs".into())));
        assert_eq!(row.get("arg_limit"), Some(&Cell::Int(10)));
        assert_eq!(row.get("arg_opts"), Some(&Cell::Text(r#"{"raw":true}"#.into())));
        assert_eq!(row.get("arg_paths"), Some(&Cell::Text(r#"["a","b"]"#.into())));
        assert_eq!(
            row.get("result_raw"),
            Some(&Cell::Text(
                r#"[{"functionResponse":{"id":"call-1","response":{"output":"ok"}}}]"#.into()
            ))
        );

        assert_eq!(row.get("sessionId"), Some(&Cell::Text("s1".into())));
        assert_eq!(row.get("messageId"), Some(&Cell::Text("m2".into())));
        assert_eq!(row.get("messageIndex"), Some(&Cell::Int(1)));
        assert_eq!(row.get("userMessageIndex"), Some(&Cell::Null));
        assert_eq!(row.get("projectHash"), Some(&Cell::Text("e".repeat(64))));
        assert!(matches!(row.get("messageTimestamp"), Some(Cell::Timestamp(_))));

        let empty_result = &table.rows()[1];
        assert!(!empty_result.contains("result_raw"));
        assert!(!empty_result.contains("arg_path"));
        assert_eq!(empty_result.get("args"), Some(&Cell::Null));
    }

    #[test]
    fn test_thought_rows_carry_back_references() {
        let table = thoughts_table(&[tool_session()]);
        assert_eq!(table.len(), 2);

        let user_thought = &table.rows()[0];
        assert_eq!(user_thought.get("userMessageIndex"), Some(&Cell::Int(0)));
        assert_eq!(user_thought.get("thought"), Some(&Cell::Text("odd but tolerated".into())));

        let model_thought = &table.rows()[1];
        assert_eq!(model_thought.get("subject"), Some(&Cell::Text("Look".into())));
        assert_eq!(model_thought.get("messageIndex"), Some(&Cell::Int(1)));
        assert_eq!(model_thought.get("userMessageIndex"), Some(&Cell::Null));
    }

    #[test]
    fn test_no_nested_values_escape() {
        let session = tool_session();
        for table in [tool_calls_table(&[session.clone()]), thoughts_table(&[session])] {
            for row in table.rows() {
                for (_, cell) in row.iter() {
                    if let Cell::Text(text) = cell {
                        if text.starts_with('{') || text.starts_with('[') {
                            assert!(serde_json::from_str::<serde_json::Value>(text).is_ok());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_session_set() {
        assert!(tool_calls_table(&[]).is_empty());
        assert!(thoughts_table(&[]).columns().is_empty());
    }
}
