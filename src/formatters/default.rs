use crate::colors::ColorScheme;
use crate::coordinator::PipelineEvent;
use crate::parser::{ChannelState, ChatMessage, ParsedRecord};

use super::Formatter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable output, one line per record
pub struct DefaultFormatter {
    colors: ColorScheme,
}

impl DefaultFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self {
            colors: ColorScheme::new(use_colors),
        }
    }

    fn format_message(&self, message: &ChatMessage) -> String {
        format!(
            "{}[{}]{} {}{}{} > {}",
            self.colors.timestamp,
            message.timestamp.format(TIMESTAMP_FORMAT),
            self.colors.reset,
            self.colors.speaker,
            message.speaker,
            self.colors.reset,
            message.text
        )
    }

    fn format_record(&self, record: &ParsedRecord) -> Option<String> {
        let c = &self.colors;
        match record {
            ParsedRecord::ChannelOpened { channel } => {
                Some(format!("{}=== {} ==={}", c.channel, channel, c.reset))
            }
            ParsedRecord::Metadata { key, value } => {
                Some(format!("{}  {}: {}{}", c.metadata, key, value, c.reset))
            }
            ParsedRecord::Message { message, .. } => Some(self.format_message(message)),
            ParsedRecord::Reset => Some(format!("{}--- channel reset ---{}", c.notice, c.reset)),
            ParsedRecord::Skipped => None,
        }
    }
}

impl Formatter for DefaultFormatter {
    fn format(&self, event: &PipelineEvent) -> Option<String> {
        match event {
            PipelineEvent::Tracking { path } => Some(format!(
                "{}--- tracking {} ---{}",
                self.colors.notice,
                path.display(),
                self.colors.reset
            )),
            PipelineEvent::Record { record, .. } => self.format_record(record),
            PipelineEvent::StateCleared => Some(format!(
                "{}--- state cleared ---{}",
                self.colors.notice, self.colors.reset
            )),
            // Errors go to the stderr panel
            PipelineEvent::Error(_) => None,
        }
    }

    fn format_state(&self, state: &ChannelState) -> String {
        let mut lines = vec![format!(
            "channel: {} ({:?}, {} messages)",
            state.channel_name.as_deref().unwrap_or("-"),
            state.mode,
            state.messages.len()
        )];
        for (key, value) in &state.metadata {
            lines.push(format!("  {}: {}", key, value));
        }
        for message in &state.messages {
            lines.push(self.format_message(message));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn message() -> ChatMessage {
        ChatMessage {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(18, 0, 1)
                .unwrap(),
            speaker: "Alice".to_string(),
            text: "warp to me".to_string(),
        }
    }

    fn record(record: ParsedRecord) -> PipelineEvent {
        PipelineEvent::Record {
            origin_file: Arc::from(Path::new("fleet.txt")),
            sequence: 0,
            record,
        }
    }

    #[test]
    fn test_message_line() {
        let formatter = DefaultFormatter::new(false);
        let event = record(ParsedRecord::Message {
            channel: "fleet".to_string(),
            index: 0,
            message: message(),
        });

        assert_eq!(
            formatter.format(&event).unwrap(),
            "[2024-03-01 18:00:01] Alice > warp to me"
        );
    }

    #[test]
    fn test_skipped_and_errors_are_silent() {
        let formatter = DefaultFormatter::new(false);
        assert!(formatter.format(&record(ParsedRecord::Skipped)).is_none());
        assert!(formatter
            .format(&PipelineEvent::Error(crate::error::ErrorRecord::new(
                crate::error::ErrorKind::Parse,
                "bad"
            )))
            .is_none());
    }

    #[test]
    fn test_tracking_and_banner() {
        let formatter = DefaultFormatter::new(false);
        let tracking = PipelineEvent::Tracking {
            path: PathBuf::from("/logs/fleet.txt"),
        };
        assert_eq!(
            formatter.format(&tracking).unwrap(),
            "--- tracking /logs/fleet.txt ---"
        );

        let opened = record(ParsedRecord::ChannelOpened {
            channel: "fleet".to_string(),
        });
        assert_eq!(formatter.format(&opened).unwrap(), "=== fleet ===");
    }

    #[test]
    fn test_state_summary() {
        let formatter = DefaultFormatter::new(false);
        let mut state = ChannelState {
            channel_name: Some("fleet".to_string()),
            ..Default::default()
        };
        state.messages.push(message());

        let text = formatter.format_state(&state);
        assert!(text.starts_with("channel: fleet (Idle, 1 messages)"));
        assert!(text.ends_with("Alice > warp to me"));
    }
}
