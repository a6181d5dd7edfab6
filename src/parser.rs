//! Stateful channel log parser
//!
//! Lines are classified into a closed set of kinds by [`classify`], then
//! applied to the accumulated [`ChannelState`]. Two header styles are
//! understood: the compact `=== CHANNEL: <name> ===` marker and the session
//! header block written by the EVE Online client:
//!
//! ```text
//! ---------------------------------------------------------------
//!   Channel ID:      -12345
//!   Channel Name:    Fleet
//!   Listener:        Some Pilot
//!   Session started: 2024.03.01 18:00:00
//! ---------------------------------------------------------------
//! [ 2024.03.01 18:00:05 ] Some Pilot > align to the gate
//! ```

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ParseError;

const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

static CHANNEL_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*===\s*CHANNEL:\s*(?P<name>.*?)\s*===\s*$").expect("valid header regex")
});

static RESET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*===\s*RESET\s*===\s*$").expect("valid reset regex"));

static SESSION_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<key>Channel ID|Channel Name|Listener|Session started):\s*(?P<value>.*?)\s*$")
        .expect("valid session field regex")
});

static MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\[\s*(?P<ts>\d{4}\.\d{2}\.\d{2} \d{2}:\d{2}:\d{2})\s*\]\s*(?P<speaker>[^>]*?)\s*>\s?(?P<text>.*)$",
    )
    .expect("valid message regex")
});

/// A single chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub timestamp: NaiveDateTime,
    pub speaker: String,
    pub text: String,
}

/// Classification of one raw line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Header { channel: String },
    Metadata { key: String, value: String },
    Message(ChatMessage),
    ResetMarker,
    /// Blank lines and `-----` rules around the session header
    Filler,
    Unrecognized,
}

/// Classify a line without touching any state.
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() || (trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')) {
        return LineKind::Filler;
    }

    if RESET_MARKER.is_match(line) {
        return LineKind::ResetMarker;
    }

    if let Some(caps) = CHANNEL_HEADER.captures(line) {
        let channel = caps["name"].to_string();
        if channel.is_empty() {
            return LineKind::Unrecognized;
        }
        return LineKind::Header { channel };
    }

    if let Some(caps) = SESSION_FIELD.captures(line) {
        let key = caps["key"].to_string();
        let value = caps["value"].to_string();
        if key == "Channel Name" && !value.is_empty() {
            return LineKind::Header { channel: value };
        }
        return LineKind::Metadata { key, value };
    }

    if let Some(caps) = MESSAGE.captures(line) {
        return match NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT) {
            Ok(timestamp) => LineKind::Message(ChatMessage {
                timestamp,
                speaker: caps["speaker"].to_string(),
                text: caps["text"].to_string(),
            }),
            Err(_) => LineKind::Unrecognized,
        };
    }

    LineKind::Unrecognized
}

/// Where the parser is in a channel log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ParserMode {
    #[default]
    Idle,
    ReadingEntries,
}

/// Everything accumulated from the lines parsed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub channel_name: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub mode: ParserMode,
    /// Session header fields such as `Listener` or `Channel ID`
    pub metadata: BTreeMap<String, String>,
}

/// Result of applying one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedRecord {
    ChannelOpened {
        channel: String,
    },
    Metadata {
        key: String,
        value: String,
    },
    Message {
        channel: String,
        /// Position in the channel's accumulated messages
        index: usize,
        #[serde(flatten)]
        message: ChatMessage,
    },
    Reset,
    Skipped,
}

#[derive(Debug, Default)]
pub struct ChannelParser {
    state: ChannelState,
}

impl ChannelParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line to the channel state.
    ///
    /// A rejected line leaves the state exactly as it was.
    pub fn parse(&mut self, line: &str) -> Result<ParsedRecord, ParseError> {
        match (classify(line), self.state.mode) {
            (LineKind::Filler, _) => Ok(ParsedRecord::Skipped),
            (LineKind::ResetMarker, _) => {
                self.reset();
                Ok(ParsedRecord::Reset)
            }
            (LineKind::Header { channel }, _) => {
                self.state.channel_name = Some(channel.clone());
                self.state.messages.clear();
                self.state.mode = ParserMode::ReadingEntries;
                Ok(ParsedRecord::ChannelOpened { channel })
            }
            (LineKind::Metadata { key, value }, _) => {
                self.state.metadata.insert(key.clone(), value.clone());
                Ok(ParsedRecord::Metadata { key, value })
            }
            (LineKind::Message(message), ParserMode::ReadingEntries) => {
                let index = self.state.messages.len();
                self.state.messages.push(message.clone());
                Ok(ParsedRecord::Message {
                    channel: self.state.channel_name.clone().unwrap_or_default(),
                    index,
                    message,
                })
            }
            (LineKind::Message(_), ParserMode::Idle) => {
                Err(ParseError::new(line, "message before channel header"))
            }
            (LineKind::Unrecognized, _) => Err(ParseError::new(line, "unrecognized line")),
        }
    }

    /// Back to the empty initial state. Calling it repeatedly is harmless.
    pub fn reset(&mut self) {
        self.state = ChannelState::default();
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }
}
