use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the watcher thread, the queue runner and the front-end
#[derive(Debug)]
pub struct PipelineStats {
    lines_read: AtomicU64,
    records_parsed: AtomicU64,
    parse_errors: AtomicU64,
    file_system_errors: AtomicU64,
    watch_errors: AtomicU64,
    rotations: AtomicU64,
    files_tracked: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub records_parsed: u64,
    pub parse_errors: u64,
    pub file_system_errors: u64,
    pub watch_errors: u64,
    pub rotations: u64,
    pub files_tracked: u64,
    pub elapsed: Duration,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            lines_read: AtomicU64::new(0),
            records_parsed: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            file_system_errors: AtomicU64::new(0),
            watch_errors: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            files_tracked: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn add_line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_record_parsed(&self) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_file_system_error(&self) {
        self.file_system_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_watch_error(&self) {
        self.watch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_file_tracked(&self) {
        self.files_tracked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            file_system_errors: self.file_system_errors.load(Ordering::Relaxed),
            watch_errors: self.watch_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            files_tracked: self.files_tracked.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl StatsSnapshot {
    pub fn errors(&self) -> u64 {
        self.parse_errors + self.file_system_errors + self.watch_errors
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} parsed",
            self.lines_read, self.records_parsed
        );

        if self.files_tracked > 0 {
            output.push_str(&format!(", {} files", self.files_tracked));
        }

        if self.rotations > 0 {
            output.push_str(&format!(", {} rotations", self.rotations));
        }

        if self.errors() > 0 {
            output.push_str(&format!(
                ", {} errors ({} parse, {} file system, {} watch)",
                self.errors(),
                self.parse_errors,
                self.file_system_errors,
                self.watch_errors
            ));
        }

        output.push_str(&format!(" in {}ms", self.elapsed.as_millis()));
        output
    }
}
