use anyhow::{anyhow, Result};
use clap::{CommandFactory, FromArgMatches};
use crossbeam_channel::{never, select, unbounded, Receiver};
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chantail::cli::Cli;
use chantail::colors::ColorScheme;
use chantail::commands::{spawn_command_reader, Command};
use chantail::config::ChantailConfig;
use chantail::config_file::ConfigFile;
use chantail::coordinator::{Coordinator, PipelineEvent};
use chantail::error::{ErrorKind, ErrorRecord};
use chantail::formatters::{create_formatter, Formatter};
use chantail::platform::{Ctrl, ExitCode, SafeStdout, SignalHandler};
use chantail::stats::PipelineStats;
use chantail::{locate, tty};

/// Where everything the pipeline produces ends up
struct Output {
    formatter: Box<dyn Formatter>,
    stdout: SafeStdout,
    stderr_colors: ColorScheme,
}

impl Output {
    fn new(config: &ChantailConfig) -> Self {
        let color = config.output.color;
        Self {
            formatter: create_formatter(
                config.output.format,
                tty::should_use_colors_with_mode(color, tty::is_stdout_tty()),
            ),
            stdout: SafeStdout::new(),
            stderr_colors: ColorScheme::new(tty::should_use_colors_with_mode(
                color,
                tty::is_stderr_tty(),
            )),
        }
    }

    fn emit(&mut self, event: &PipelineEvent) -> Result<()> {
        if let PipelineEvent::Error(record) = event {
            self.diagnostic(record);
        } else if let Some(line) = self.formatter.format(event) {
            self.stdout.writeln(&line)?;
        }
        Ok(())
    }

    /// Emit everything the pipeline has delivered so far
    fn flush(&mut self, events: &Receiver<PipelineEvent>) -> Result<()> {
        for event in events.try_iter() {
            self.emit(&event)?;
        }
        Ok(())
    }

    fn diagnostic(&self, record: &ErrorRecord) {
        eprintln!("{}", tty::format_diagnostic(record, &self.stderr_colors));
    }

    fn error(&self, err: &anyhow::Error) {
        eprintln!(
            "{}chantail:{} {:#}",
            self.stderr_colors.error, self.stderr_colors.reset, err
        );
    }

    fn stats(&self, stats: &PipelineStats) {
        eprintln!("{}", stats.snapshot().format_stats());
    }
}

fn main() -> Result<()> {
    // Broadcast channel for shutdown requests from signal handler
    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();

    // Initialize signal handling early
    let _signal_handler = match SignalHandler::new(ctrl_tx.clone()) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("chantail: Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let cli = process_args_with_config();
    let config = ChantailConfig::from_cli(&cli);
    setup_logging(config.output.verbose);

    let mut output = Output::new(&config);
    let (event_tx, event_rx) = unbounded();
    let mut coordinator = Coordinator::new(config.tail.clone(), event_tx);

    match initial_file(&config) {
        // Tracking failures arrive through the event channel
        Ok(path) => {
            let _ = coordinator.switch_file(path);
        }
        Err(e) => output.diagnostic(&ErrorRecord::new(ErrorKind::FileSystem, format!("{:#}", e))),
    }

    let (command_tx, command_rx) = unbounded();
    let _command_reader = spawn_command_reader(BufReader::new(std::io::stdin()), command_tx);
    let idle = never();
    let mut commands_open = true;

    loop {
        select! {
            recv(event_rx) -> event => match event {
                Ok(event) => output.emit(&event)?,
                Err(_) => break,
            },
            recv(ctrl_rx) -> ctrl => match ctrl {
                Ok(Ctrl::Shutdown { .. }) | Err(_) => break,
                Ok(Ctrl::PrintStats) => output.stats(coordinator.stats()),
            },
            recv(if commands_open { &command_rx } else { &idle }) -> command => match command {
                Ok(Ok(command)) => {
                    if !run_command(command, &mut coordinator, &config, &event_rx, &mut output)? {
                        break;
                    }
                }
                Ok(Err(e)) => output.error(&e),
                // EOF on stdin: keep tailing until a signal arrives
                Err(_) => commands_open = false,
            },
        }
    }

    if SignalHandler::should_terminate() {
        tracing::info!("shutting down on signal");
    }

    coordinator.stop();
    output.flush(&event_rx)?;

    if config.output.stats {
        output.stats(coordinator.stats());
    }

    Ok(())
}

/// Apply one stdin command. Returns false when the program should exit.
fn run_command(
    command: Command,
    coordinator: &mut Coordinator,
    config: &ChantailConfig,
    events: &Receiver<PipelineEvent>,
    output: &mut Output,
) -> Result<bool> {
    match command {
        Command::Switch(path) => {
            let _ = coordinator.switch_file(path);
        }
        Command::Channel(channel) => match channel_file(config, &channel) {
            Ok(path) => {
                let _ = coordinator.switch_file(path);
            }
            Err(e) => output.error(&e),
        },
        Command::Reset => coordinator.reset(),
        Command::State => {
            let state = coordinator.channel_state();
            // Records queued before the request print ahead of the summary
            output.flush(events)?;
            let summary = output.formatter.format_state(&state);
            output.stdout.writeln(&summary)?;
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// The explicit file, or the newest log of the configured channel
fn initial_file(config: &ChantailConfig) -> Result<PathBuf> {
    match &config.input.file {
        Some(file) => Ok(file.clone()),
        None => channel_file(config, &config.input.channel),
    }
}

fn channel_file(config: &ChantailConfig, channel: &str) -> Result<PathBuf> {
    let dir = config
        .effective_dir()
        .ok_or_else(|| anyhow!("No chat log directory found; pass --dir or a FILE"))?;
    locate::newest_channel_file(&dir, channel)
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("chantail=warn"),
        1 => EnvFilter::new("chantail=info,warn"),
        _ => EnvFilter::new("chantail=debug,warn"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Extract --config-file argument from raw args
fn extract_config_file_arg(args: &[String]) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == "--config-file")
        .map(|pair| pair[1].clone())
}

fn process_args_with_config() -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();

    // Check for --show-config first, before any other processing
    if raw_args.iter().any(|arg| arg == "--show-config") {
        ConfigFile::show_config();
        ExitCode::Success.exit();
    }

    let processed_args = if raw_args.iter().any(|arg| arg == "--ignore-config") {
        raw_args
    } else {
        let config_file_path = extract_config_file_arg(&raw_args);
        match ConfigFile::load_with_custom_path(config_file_path.as_deref())
            .and_then(|config_file| config_file.process_args(raw_args))
        {
            Ok(processed) => processed,
            Err(e) => {
                eprintln!("chantail: Config file error: {:#}", e);
                ExitCode::GeneralError.exit();
            }
        }
    };

    let matches = Cli::command().get_matches_from(processed_args);
    match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("chantail: Error: {}", e);
            ExitCode::InvalidUsage.exit();
        }
    }
}
