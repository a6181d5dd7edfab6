//! Finding the log file that belongs to a channel.
//!
//! Chat clients write one file per channel session, named after the channel
//! (e.g. `Fleet_20240301_180000.txt`). The newest file whose name contains
//! the channel name is the one to follow.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// `<Documents>/EVE/logs/Chatlogs`, when a documents folder is known
pub fn default_chatlog_dir() -> Option<PathBuf> {
    dirs::document_dir().map(|docs| docs.join("EVE").join("logs").join("Chatlogs"))
}

/// Regular files in `dir` whose name contains `channel`, ignoring case
pub fn channel_files(dir: &Path, channel: &str) -> Result<Vec<(PathBuf, SystemTime)>> {
    let needle = channel.to_lowercase();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read log directory: {}", dir.display()))?;

    let mut matches = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !name.contains(&needle) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        matches.push((entry.path(), modified));
    }

    Ok(matches)
}

/// Most recently modified file for `channel` in `dir`
pub fn newest_channel_file(dir: &Path, channel: &str) -> Result<PathBuf> {
    channel_files(dir, channel)?
        .into_iter()
        // Equal mtimes fall back to the name, which embeds the session start
        .max_by(|(path_a, mtime_a), (path_b, mtime_b)| {
            mtime_a.cmp(mtime_b).then_with(|| path_a.cmp(path_b))
        })
        .map(|(path, _)| path)
        .ok_or_else(|| {
            anyhow!(
                "No log file matching channel '{}' in {}",
                channel,
                dir.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn test_newest_matching_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Fleet_20240301_180000.txt", Duration::from_secs(300));
        let newest = touch(dir.path(), "Fleet_20240302_180000.txt", Duration::from_secs(10));
        touch(dir.path(), "Local_20240303_180000.txt", Duration::from_secs(1));

        let found = newest_channel_file(dir.path(), "fleet").unwrap();
        assert_eq!(found, newest);
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "My_FLEET_channel.txt", Duration::from_secs(1));

        assert_eq!(newest_channel_file(dir.path(), "Fleet").unwrap(), path);
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("fleet_archive")).unwrap();

        let err = newest_channel_file(dir.path(), "fleet").unwrap_err();
        assert!(err.to_string().contains("No log file matching channel 'fleet'"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = channel_files(&dir.path().join("nope"), "fleet").unwrap_err();
        assert!(err.to_string().contains("Failed to read log directory"));
    }
}
