use serde_json::{json, Value};

use crate::coordinator::PipelineEvent;
use crate::parser::ChannelState;

use super::Formatter;

/// One JSON object per line
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_line(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

impl Formatter for JsonFormatter {
    fn format(&self, event: &PipelineEvent) -> Option<String> {
        let value = match event {
            PipelineEvent::Tracking { path } => json!({
                "kind": "tracking",
                "path": path.display().to_string(),
            }),
            PipelineEvent::Record {
                origin_file,
                sequence,
                record,
            } => {
                let mut value = serde_json::to_value(record).ok()?;
                if value["kind"] == "skipped" {
                    return None;
                }
                if let Value::Object(fields) = &mut value {
                    fields.insert(
                        "file".to_string(),
                        Value::String(origin_file.display().to_string()),
                    );
                    fields.insert("sequence".to_string(), json!(sequence));
                }
                value
            }
            PipelineEvent::StateCleared => json!({ "kind": "state_cleared" }),
            PipelineEvent::Error(_) => return None,
        };
        Some(to_line(&value))
    }

    fn format_state(&self, state: &ChannelState) -> String {
        serde_json::to_value(state)
            .map(|value| to_line(&json!({ "kind": "state", "state": value })))
            .unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ChatMessage, ParsedRecord};
    use chrono::NaiveDate;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_message_carries_origin_and_sequence() {
        let event = PipelineEvent::Record {
            origin_file: Arc::from(Path::new("fleet.txt")),
            sequence: 7,
            record: ParsedRecord::Message {
                channel: "fleet".to_string(),
                index: 2,
                message: ChatMessage {
                    timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(18, 0, 1)
                        .unwrap(),
                    speaker: "Alice".to_string(),
                    text: "hi".to_string(),
                },
            },
        };

        let line = JsonFormatter::new().format(&event).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "message");
        assert_eq!(value["channel"], "fleet");
        assert_eq!(value["index"], 2);
        assert_eq!(value["speaker"], "Alice");
        assert_eq!(value["timestamp"], "2024-03-01T18:00:01");
        assert_eq!(value["file"], "fleet.txt");
        assert_eq!(value["sequence"], 7);
    }

    #[test]
    fn test_skipped_lines_produce_nothing() {
        let event = PipelineEvent::Record {
            origin_file: Arc::from(Path::new("fleet.txt")),
            sequence: 0,
            record: ParsedRecord::Skipped,
        };
        assert!(JsonFormatter::new().format(&event).is_none());
    }

    #[test]
    fn test_state_is_wrapped() {
        let state = ChannelState {
            channel_name: Some("fleet".to_string()),
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&JsonFormatter::new().format_state(&state)).unwrap();
        assert_eq!(value["kind"], "state");
        assert_eq!(value["state"]["channel_name"], "fleet");
        assert_eq!(value["state"]["mode"], "Idle");
    }
}
