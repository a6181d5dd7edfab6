// Core library for the chantail channel log follower

pub mod cli;
pub mod colors;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod coordinator;
pub mod error;
pub mod formatters;
pub mod locate;
pub mod parser;
pub mod platform;
pub mod queue;
pub mod splitter;
pub mod stats;
pub mod tail;
pub mod tty;
pub mod watcher;

pub use config::ChantailConfig;
pub use coordinator::{Coordinator, PipelineEvent};
pub use error::{ErrorKind, ErrorRecord, ParseError, TailError};
pub use parser::{ChannelParser, ChannelState, ParsedRecord};
pub use stats::{PipelineStats, StatsSnapshot};
