//! Detects content appended to the tracked file and turns it into ordered
//! line events.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::TailError;
use crate::splitter::TextEncoding;

/// One complete line read from the tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEvent {
    pub text: String,
    pub origin_file: Arc<Path>,
    /// Position within the current tracked-file lifetime, starting at 0
    pub sequence: u64,
}

/// Read position and carry-over for the file currently being followed
#[derive(Debug)]
struct TrackedFile {
    path: Arc<Path>,
    last_size: u64,
    last_modified: Option<SystemTime>,
    encoding: TextEncoding,
    pending_fragment: Vec<u8>,
    next_sequence: u64,
}

impl TrackedFile {
    fn open(path: &Path) -> Result<(Self, u64), TailError> {
        let metadata = fs::metadata(path).map_err(|e| TailError::file_system(path, e))?;
        if !metadata.is_file() {
            return Err(TailError::file_system(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let head = read_range(path, 0, 2).map_err(|e| TailError::file_system(path, e))?;
        let mut tracked = Self {
            path: Arc::from(path),
            last_size: 0,
            last_modified: metadata.modified().ok(),
            encoding: TextEncoding::Utf8,
            pending_fragment: Vec::new(),
            next_sequence: 0,
        };
        tracked.detect_encoding(&head);
        Ok((tracked, metadata.len()))
    }

    /// Re-decide the encoding from bytes read at the start of the file.
    fn detect_encoding(&mut self, head: &[u8]) {
        if head.len() < 2 {
            return;
        }
        let encoding = TextEncoding::detect(head);
        if encoding != self.encoding {
            tracing::info!(path = %self.path.display(), ?encoding, "text encoding detected");
            self.encoding = encoding;
        }
    }

    /// Re-stat the file and read whatever was appended since the last look.
    /// Returns the new events and whether a rotation was detected.
    fn advance(&mut self) -> Result<(Vec<LineEvent>, bool), TailError> {
        let metadata =
            fs::metadata(&self.path).map_err(|e| TailError::file_system(self.path.as_ref(), e))?;
        let size = metadata.len();
        let modified = metadata.modified().ok();

        let mut rotated = false;
        if size < self.last_size {
            tracing::warn!(
                path = %self.path.display(),
                previous_size = self.last_size,
                current_size = size,
                "file shrank; treating as rotation and reading from the start"
            );
            self.last_size = 0;
            self.pending_fragment.clear();
            self.next_sequence = 0;
            rotated = true;
        }

        if size == self.last_size {
            if modified != self.last_modified {
                tracing::debug!(
                    path = %self.path.display(),
                    size,
                    "file modified without growing; nothing to read"
                );
                self.last_modified = modified;
            }
            return Ok((Vec::new(), rotated));
        }
        self.last_modified = modified;

        let events = self.read_until(size)?;
        Ok((events, rotated))
    }

    /// Read `[last_size, size)` and split it into line events.
    fn read_until(&mut self, size: u64) -> Result<Vec<LineEvent>, TailError> {
        let start = self.last_size;
        let bytes = read_range(&self.path, start, size)
            .map_err(|e| TailError::file_system(self.path.as_ref(), e))?;

        tracing::debug!(
            path = %self.path.display(),
            offset = start,
            bytes = bytes.len(),
            "read appended bytes"
        );

        // The file may have been truncated between stat and read
        self.last_size = start + bytes.len() as u64;

        let delta = if start == 0 {
            self.detect_encoding(&bytes);
            self.encoding.strip_bom(&bytes)
        } else {
            &bytes[..]
        };
        let split = self.encoding.split(&self.pending_fragment, delta);
        self.pending_fragment = split.fragment;

        Ok(split
            .lines
            .into_iter()
            .map(|text| self.next_event(text))
            .collect())
    }

    fn next_event(&mut self, text: String) -> LineEvent {
        let event = LineEvent {
            text,
            origin_file: Arc::clone(&self.path),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        event
    }
}

fn read_range(path: &Path, start: u64, end: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut bytes = Vec::with_capacity(end.saturating_sub(start) as usize);
    file.take(end.saturating_sub(start)).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Follows exactly one file at a time.
///
/// `track` replaces the followed file wholesale; `poll` is the change trigger.
/// Any I/O failure drops the detector back to idle, and only a new `track`
/// call resumes it.
#[derive(Debug)]
pub struct TailDetector {
    replay_existing: bool,
    tracked: Option<TrackedFile>,
    rotations: u64,
}

impl TailDetector {
    pub fn new(replay_existing: bool) -> Self {
        Self {
            replay_existing,
            tracked: None,
            rotations: 0,
        }
    }

    /// Start following `path`, forgetting the previous file.
    ///
    /// With replay enabled the file's existing content comes back as the
    /// initial burst of events; otherwise tailing starts at the current end.
    pub fn track(&mut self, path: impl AsRef<Path>) -> Result<Vec<LineEvent>, TailError> {
        self.tracked = None;
        let path = path.as_ref();

        let (mut tracked, size) = TrackedFile::open(path)?;
        let events = if self.replay_existing {
            tracked.read_until(size)?
        } else {
            tracked.last_size = size;
            Vec::new()
        };

        tracing::info!(
            path = %path.display(),
            size,
            replayed = events.len(),
            "tracking file"
        );
        self.tracked = Some(tracked);
        Ok(events)
    }

    /// Look at the tracked file again and emit lines appended since the last look.
    pub fn poll(&mut self) -> Result<Vec<LineEvent>, TailError> {
        let Some(tracked) = self.tracked.as_mut() else {
            return Ok(Vec::new());
        };

        match tracked.advance() {
            Ok((events, rotated)) => {
                if rotated {
                    self.rotations += 1;
                }
                Ok(events)
            }
            Err(err) => {
                self.tracked = None;
                Err(err)
            }
        }
    }

    /// Emit the unterminated trailing line, if any, as a final event.
    pub fn flush_fragment(&mut self) -> Option<LineEvent> {
        let tracked = self.tracked.as_mut()?;
        if tracked.pending_fragment.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut tracked.pending_fragment);
        let text = tracked.encoding.decode(&bytes);
        Some(tracked.next_event(text))
    }

    /// Go idle without tracking anything.
    pub fn stop(&mut self) {
        self.tracked = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked.is_some()
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.tracked.as_ref().map(|t| t.path.to_path_buf())
    }

    /// Size of the tracked file as of the last observation
    pub fn last_size(&self) -> Option<u64> {
        self.tracked.as_ref().map(|t| t.last_size)
    }

    /// Number of rotations seen since this detector was created
    pub fn rotations(&self) -> u64 {
        self.rotations
    }
}
