use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct for chantail
#[derive(Debug, Clone)]
pub struct ChantailConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub tail: TailConfig,
}

/// Which file to follow
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Explicit file; wins over the channel lookup
    pub file: Option<PathBuf>,
    /// Folder searched for channel log files
    pub dir: Option<PathBuf>,
    pub channel: String,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: ColorMode,
    pub stats: bool,
    pub verbose: u8,
}

/// Tail detector and watcher settings
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Emit the file's existing content before tailing new growth
    pub replay_existing: bool,
    pub watch_mode: WatchMode,
    /// Polling period, also the fallback tick when native events are used
    pub poll_interval: Duration,
}

/// How file changes are noticed
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Native notifications, falling back to polling when unavailable
    #[default]
    Auto,
    /// Native notifications only (inotify/FSEvents/ReadDirectoryChangesW)
    Native,
    /// Periodic polling only; use on network file systems
    Poll,
}

/// Output format for parsed records
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Default,
    Json,
}

/// Color output mode
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

pub const DEFAULT_CHANNEL: &str = "fleet";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            replay_existing: true,
            watch_mode: WatchMode::Auto,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ChantailConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        Self {
            input: InputConfig {
                file: cli.file.clone(),
                dir: cli.dir.clone(),
                channel: cli.channel.clone(),
            },
            output: OutputConfig {
                format: cli.output_format,
                color: cli.color,
                stats: cli.stats,
                verbose: cli.verbose,
            },
            tail: TailConfig {
                replay_existing: !cli.no_replay,
                watch_mode: cli.watch,
                poll_interval: *cli.poll_interval,
            },
        }
    }

    /// Directory used for channel lookups
    pub fn effective_dir(&self) -> Option<PathBuf> {
        self.input
            .dir
            .clone()
            .or_else(crate::locate::default_chatlog_dir)
    }
}

impl Default for ChantailConfig {
    fn default() -> Self {
        Self {
            input: InputConfig {
                file: None,
                dir: None,
                channel: DEFAULT_CHANNEL.to_string(),
            },
            output: OutputConfig {
                format: OutputFormat::Default,
                color: ColorMode::Auto,
                stats: false,
                verbose: 0,
            },
            tail: TailConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_config_defaults_to_replay() {
        let config = TailConfig::default();
        assert!(config.replay_existing);
        assert_eq!(config.watch_mode, WatchMode::Auto);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_explicit_dir_wins() {
        let mut config = ChantailConfig::default();
        config.input.dir = Some(PathBuf::from("/tmp/logs"));
        assert_eq!(config.effective_dir(), Some(PathBuf::from("/tmp/logs")));
    }
}
