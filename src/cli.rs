// CLI-specific types and structures
// This module contains the command-line interface definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ColorMode, OutputFormat, WatchMode, DEFAULT_CHANNEL};

// CLI structure - contains all command-line arguments and options
#[derive(Parser, Debug)]
#[command(name = "chantail")]
#[command(about = "Follow a growing channel chat log and print parsed messages")]
#[command(
    long_about = "Follow a growing channel chat log and print parsed messages\n\nWithout FILE, the most recently modified log in --dir whose name contains\n--channel is followed.\n\nCOMMANDS (one per line on stdin):\n  switch <path>    follow another file\n  channel <name>   follow the newest log of another channel\n  reset            clear the accumulated channel state\n  state            print the accumulated channel state\n  quit             drain and exit\n\nCOMMON EXAMPLES:\n  chantail ~/Documents/EVE/logs/Chatlogs/Fleet_20240301_180000.txt\n  chantail --channel local --no-replay\n  chantail --watch poll --poll-interval 1s -F json"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Log file to follow (newest channel log if not specified)
    pub file: Option<PathBuf>,

    /// Directory searched for channel logs (default: the EVE chat log folder)
    #[arg(short = 'd', long = "dir", help_heading = "Input Options")]
    pub dir: Option<PathBuf>,

    /// Channel whose newest log is followed when no FILE is given
    #[arg(
        short = 'c',
        long = "channel",
        default_value = DEFAULT_CHANNEL,
        help_heading = "Input Options"
    )]
    pub channel: String,

    /// Start at the end of the file instead of replaying its existing content
    #[arg(long = "no-replay", help_heading = "Input Options")]
    pub no_replay: bool,

    /// How changes to the file are noticed
    #[arg(
        long = "watch",
        value_enum,
        default_value = "auto",
        help_heading = "Watch Options"
    )]
    pub watch: WatchMode,

    /// How often the file is checked, e.g. 250ms, 2s
    #[arg(
        long = "poll-interval",
        default_value = "250ms",
        help_heading = "Watch Options"
    )]
    pub poll_interval: humantime::Duration,

    /// Output format
    #[arg(
        short = 'F',
        long = "output-format",
        value_enum,
        default_value = "default",
        help_heading = "Output Options"
    )]
    pub output_format: OutputFormat,

    /// Colored diagnostics
    #[arg(
        long = "color",
        value_enum,
        default_value = "auto",
        help_heading = "Output Options"
    )]
    pub color: ColorMode,

    /// Print processing statistics on exit
    #[arg(short = 's', long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    /// More internal logging on stderr (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Specify custom configuration file path
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore configuration file
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}
