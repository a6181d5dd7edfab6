//! Rendering pipeline events for stdout.

mod default;
mod json;

pub use default::DefaultFormatter;
pub use json::JsonFormatter;

use crate::config::OutputFormat;
use crate::coordinator::PipelineEvent;
use crate::parser::ChannelState;

/// Turns pipeline events into output lines
pub trait Formatter: Send {
    /// `None` when the event produces no output (skipped lines, errors)
    fn format(&self, event: &PipelineEvent) -> Option<String>;

    /// Rendering of the accumulated channel state for the `state` command
    fn format_state(&self, state: &ChannelState) -> String;
}

pub fn create_formatter(format: OutputFormat, use_colors: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Default => Box::new(DefaultFormatter::new(use_colors)),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}
