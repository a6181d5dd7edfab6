// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chantail::config::{TailConfig, WatchMode};
use chantail::coordinator::PipelineEvent;
use chantail::parser::ParsedRecord;
use crossbeam_channel::Receiver;

/// Header plus three messages, the smallest realistic fleet log
pub const FLEET_LOG: &str = "=== CHANNEL: fleet ===\n\
[ 2024.03.01 18:00:01 ] Alice > form up\n\
[ 2024.03.01 18:00:02 ] Bob > aligning\n\
[ 2024.03.01 18:00:03 ] Alice > jump\n";

pub fn message_line(second: u32, speaker: &str, text: &str) -> String {
    format!("[ 2024.03.01 18:00:{:02} ] {} > {}\n", second, speaker, text)
}

pub fn write_log(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write log file");
    path
}

pub fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open log file for append");
    file.write_all(content.as_bytes())
        .expect("Failed to append to log file");
}

/// Polling with an interval long enough that only `poll_now` drives reads
pub fn manual_poll_config() -> TailConfig {
    TailConfig {
        replay_existing: true,
        watch_mode: WatchMode::Poll,
        poll_interval: Duration::from_secs(3600),
    }
}

pub fn drain_events(rx: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    rx.try_iter().collect()
}

/// Records with their origin file and sequence, skipping filler
pub fn records(events: &[PipelineEvent]) -> Vec<(PathBuf, u64, ParsedRecord)> {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Record {
                origin_file,
                sequence,
                record,
            } if *record != ParsedRecord::Skipped => {
                Some((origin_file.to_path_buf(), *sequence, record.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn message_texts(events: &[PipelineEvent]) -> Vec<String> {
    records(events)
        .into_iter()
        .filter_map(|(_, _, record)| match record {
            ParsedRecord::Message { message, .. } => Some(message.text),
            _ => None,
        })
        .collect()
}

/// Run chantail with the given arguments, feeding `commands` on stdin.
/// Config files are always ignored so the user's own settings cannot leak in.
pub fn run_chantail_with_commands(args: &[&str], commands: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_chantail"))
        .arg("--ignore-config")
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start chantail");

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(commands.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}
