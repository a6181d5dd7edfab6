//! Pipeline coordinator
//!
//! Wires the tail detector, the ordered queue and the channel parser
//! together. Everything that reaches the event sink travels through the
//! queue, so the sink sees tracking notices, records and errors in exactly
//! the order the detector produced the underlying lines.

use crossbeam_channel::{bounded, select, Sender};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crate::config::TailConfig;
use crate::error::{ErrorKind, ErrorRecord, TailError};
use crate::parser::{ChannelParser, ChannelState, ParsedRecord};
use crate::queue::OrderedQueue;
use crate::stats::PipelineStats;
use crate::tail::{LineEvent, TailDetector};
use crate::watcher::{ChangeWatcher, WatchSignal};

/// Events delivered to the front-end
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A new file is being followed; records after this one belong to it
    Tracking { path: PathBuf },
    Record {
        origin_file: Arc<Path>,
        sequence: u64,
        record: ParsedRecord,
    },
    Error(ErrorRecord),
    /// Parser state was cleared on request
    StateCleared,
}

/// Lock with poison recovery; a panicking work item must not wedge the pipeline
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("recovering state after a panicked work item");
            poisoned.into_inner()
        }
    }
}

struct Shared {
    detector: Mutex<TailDetector>,
    queue: OrderedQueue,
    parser: Arc<Mutex<ChannelParser>>,
    sink: Sender<PipelineEvent>,
    stats: Arc<PipelineStats>,
}

impl Shared {
    /// Queue the parse of one line. Callers hold the detector lock, which
    /// keeps enqueue order identical to production order.
    fn dispatch(&self, event: LineEvent) {
        self.stats.add_line_read();
        let parser = Arc::clone(&self.parser);
        let sink = self.sink.clone();
        let stats = Arc::clone(&self.stats);

        self.queue.enqueue(move || {
            let record = lock(&parser).parse(&event.text)?;
            stats.add_record_parsed();
            let _ = sink.send(PipelineEvent::Record {
                origin_file: event.origin_file,
                sequence: event.sequence,
                record,
            });
            Ok(())
        });
    }

    /// Deliver an event behind everything already queued.
    fn notify(&self, event: PipelineEvent) {
        let sink = self.sink.clone();
        self.queue.enqueue(move || {
            let _ = sink.send(event);
            Ok(())
        });
    }

    fn report(&self, err: &TailError) {
        let record = ErrorRecord::from(err);
        match record.kind {
            ErrorKind::FileSystem => self.stats.add_file_system_error(),
            ErrorKind::Watch => self.stats.add_watch_error(),
            ErrorKind::Parse => self.stats.add_parse_error(),
        }
        tracing::warn!(error = %err, "tracking stopped");
        self.notify(PipelineEvent::Error(record));
    }

    /// Poll the detector once. Returns false when tracking has ended.
    fn pump(&self) -> bool {
        let mut detector = lock(&self.detector);
        let rotations = detector.rotations();
        let polled = detector.poll();
        match polled {
            Ok(events) => {
                if detector.rotations() > rotations {
                    self.stats.add_rotation();
                }
                for event in events {
                    self.dispatch(event);
                }
                detector.is_tracking()
            }
            Err(err) => {
                drop(detector);
                self.report(&err);
                false
            }
        }
    }

    fn watch_failed(&self, path: &Path, message: String) {
        lock(&self.detector).stop();
        self.report(&TailError::watch(path, message));
    }
}

struct WatchHandle {
    stop: Sender<()>,
    thread: thread::JoinHandle<()>,
}

fn watch_loop(
    shared: Arc<Shared>,
    watcher: ChangeWatcher,
    path: PathBuf,
    stop: crossbeam_channel::Receiver<()>,
    interval: std::time::Duration,
) {
    tracing::debug!(path = %path.display(), backend = watcher.backend_name(), "watch started");
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(watcher.signals()) -> signal => match signal {
                Ok(WatchSignal::Changed) => {
                    if !shared.pump() {
                        break;
                    }
                }
                Ok(WatchSignal::Failed(message)) => {
                    shared.watch_failed(&path, message);
                    break;
                }
                Err(_) => {
                    shared.watch_failed(&path, "notification channel closed".to_string());
                    break;
                }
            },
            default(interval) => {
                if !shared.pump() {
                    break;
                }
            }
        }
    }
    tracing::debug!(path = %path.display(), "watch ended");
}

/// Owns the whole pipeline; the only entry point for the front-end
pub struct Coordinator {
    shared: Arc<Shared>,
    config: TailConfig,
    watch: Option<WatchHandle>,
}

impl Coordinator {
    pub fn new(config: TailConfig, sink: Sender<PipelineEvent>) -> Self {
        Self::with_stats(config, sink, Arc::new(PipelineStats::new()))
    }

    pub fn with_stats(
        config: TailConfig,
        sink: Sender<PipelineEvent>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let error_sink = sink.clone();
        let error_stats = Arc::clone(&stats);
        let queue = OrderedQueue::new(move |err| {
            error_stats.add_parse_error();
            let _ = error_sink.send(PipelineEvent::Error(ErrorRecord::from_task_failure(&err)));
        });

        let shared = Shared {
            detector: Mutex::new(TailDetector::new(config.replay_existing)),
            queue,
            parser: Arc::new(Mutex::new(ChannelParser::new())),
            sink,
            stats,
        };

        Self {
            shared: Arc::new(shared),
            config,
            watch: None,
        }
    }

    /// Stop following the current file and start following `path`.
    ///
    /// Failures are delivered to the sink and returned as well.
    pub fn switch_file(&mut self, path: impl AsRef<Path>) -> Result<(), ErrorRecord> {
        let path = path.as_ref().to_path_buf();
        self.stop_watch();

        let mut detector = lock(&self.shared.detector);
        if let Some(last) = detector.flush_fragment() {
            self.shared.dispatch(last);
        }

        let tracked = detector.track(&path);
        match tracked {
            Ok(events) => {
                self.shared.stats.add_file_tracked();
                self.shared
                    .notify(PipelineEvent::Tracking { path: path.clone() });
                for event in events {
                    self.shared.dispatch(event);
                }
            }
            Err(err) => {
                drop(detector);
                self.shared.report(&err);
                return Err(ErrorRecord::from(&err));
            }
        }

        let watcher = match ChangeWatcher::new(&path, self.config.watch_mode) {
            Ok(watcher) => watcher,
            Err(err) => {
                detector.stop();
                drop(detector);
                self.shared.report(&err);
                return Err(ErrorRecord::from(&err));
            }
        };
        drop(detector);

        self.start_watch(path, watcher);
        Ok(())
    }

    fn start_watch(&mut self, path: PathBuf, watcher: ChangeWatcher) {
        let (stop_tx, stop_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let interval = self.config.poll_interval;
        let thread = thread::spawn(move || watch_loop(shared, watcher, path, stop_rx, interval));
        self.watch = Some(WatchHandle {
            stop: stop_tx,
            thread,
        });
    }

    /// Clear the accumulated channel state once all queued lines are parsed.
    pub fn reset(&self) {
        let parser = Arc::clone(&self.shared.parser);
        let sink = self.shared.sink.clone();
        self.shared.queue.enqueue(move || {
            lock(&parser).reset();
            let _ = sink.send(PipelineEvent::StateCleared);
            Ok(())
        });
    }

    /// Snapshot of the channel state after every line queued so far.
    pub fn channel_state(&self) -> ChannelState {
        let (tx, rx) = bounded(1);
        let parser = Arc::clone(&self.shared.parser);
        self.shared.queue.enqueue(move || {
            let _ = tx.send(lock(&parser).state().clone());
            Ok(())
        });
        rx.recv().unwrap_or_default()
    }

    /// Look at the tracked file right now instead of waiting for the watcher.
    pub fn poll_now(&self) {
        self.shared.pump();
    }

    /// Wait until everything queued so far has been parsed and delivered.
    pub fn drain(&self) {
        self.shared.queue.wait_idle();
    }

    /// Stop watching and deliver whatever is still queued.
    pub fn stop(&mut self) {
        self.stop_watch();
        {
            let mut detector = lock(&self.shared.detector);
            if let Some(last) = detector.flush_fragment() {
                self.shared.dispatch(last);
            }
            detector.stop();
        }
        self.drain();
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        lock(&self.shared.detector).current_path()
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.shared.detector).is_tracking()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.shared.stats
    }

    fn stop_watch(&mut self) {
        if let Some(handle) = self.watch.take() {
            let _ = handle.stop.send(());
            if handle.thread.join().is_err() {
                tracing::error!("watch thread panicked");
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop_watch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchMode;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::{Duration, Instant};

    fn poll_config() -> TailConfig {
        TailConfig {
            replay_existing: true,
            watch_mode: WatchMode::Poll,
            poll_interval: Duration::from_secs(60),
        }
    }

    fn collect(rx: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_replay_parses_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(
            &path,
            "=== CHANNEL: fleet ===\n[ 2024.03.01 18:00:01 ] A > one\n[ 2024.03.01 18:00:02 ] B > two\n",
        )
        .unwrap();

        let (tx, rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        coordinator.drain();

        let events = collect(&rx);
        assert_eq!(events[0], PipelineEvent::Tracking { path: path.clone() });
        let sequences: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Record { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        let state = coordinator.channel_state();
        assert_eq!(state.channel_name.as_deref(), Some("fleet"));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_missing_file_reports_error_and_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);

        let err = coordinator
            .switch_file(dir.path().join("absent.txt"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileSystem);
        coordinator.drain();

        let events = collect(&rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Error(r) if r.kind == ErrorKind::FileSystem)));
        assert!(!coordinator.is_tracking());

        // A later switch still works
        let path = dir.path().join("present.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n").unwrap();
        coordinator.switch_file(&path).unwrap();
        assert!(coordinator.is_tracking());
    }

    #[test]
    fn test_reset_goes_through_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n[ 2024.03.01 18:00:01 ] A > one\n").unwrap();

        let (tx, rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        coordinator.reset();
        coordinator.reset();

        assert_eq!(coordinator.channel_state(), ChannelState::default());
        let cleared = collect(&rx)
            .into_iter()
            .filter(|e| matches!(e, PipelineEvent::StateCleared))
            .count();
        assert_eq!(cleared, 2);
    }

    #[test]
    fn test_poll_now_picks_up_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n").unwrap();

        let (tx, _rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"[ 2024.03.01 18:00:01 ] A > one\n").unwrap();
        coordinator.poll_now();

        assert_eq!(coordinator.channel_state().messages.len(), 1);
        assert_eq!(coordinator.stats().snapshot().lines_read, 2);
    }

    #[test]
    fn test_stop_flushes_unterminated_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n[ 2024.03.01 18:00:01 ] A > one").unwrap();

        let (tx, _rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        assert!(coordinator.channel_state().messages.is_empty());

        coordinator.stop();
        assert_eq!(coordinator.channel_state().messages.len(), 1);
        assert!(!coordinator.is_tracking());
    }

    /// Swap the real watcher for one fed by the returned sender
    fn manual_watch(coordinator: &mut Coordinator, path: &Path) -> Sender<WatchSignal> {
        let (tx, rx) = unbounded();
        coordinator.stop_watch();
        coordinator.start_watch(path.to_path_buf(), ChangeWatcher::from_signals(rx));
        tx
    }

    fn wait_for_error(rx: &Receiver<PipelineEvent>, kind: ErrorKind) -> ErrorRecord {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(PipelineEvent::Error(record)) = rx.recv_timeout(Duration::from_millis(50)) {
                if record.kind == kind {
                    return record;
                }
            }
        }
        panic!("no {:?} error arrived", kind);
    }

    #[test]
    fn test_watch_backend_failure_stops_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n").unwrap();

        let (tx, rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        let signals = manual_watch(&mut coordinator, &path);

        signals
            .send(WatchSignal::Failed("backend died".to_string()))
            .unwrap();
        let record = wait_for_error(&rx, ErrorKind::Watch);
        assert!(record.message.contains("backend died"), "{}", record.message);

        coordinator.drain();
        assert!(!coordinator.is_tracking());
        assert_eq!(coordinator.stats().snapshot().watch_errors, 1);

        // The pipeline accepts a new file afterwards
        let next = dir.path().join("corp.txt");
        std::fs::write(&next, "=== CHANNEL: corp ===\n").unwrap();
        coordinator.switch_file(&next).unwrap();
        assert!(coordinator.is_tracking());
        assert_eq!(
            coordinator.channel_state().channel_name.as_deref(),
            Some("corp")
        );
    }

    #[test]
    fn test_closed_notification_channel_is_watch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n").unwrap();

        let (tx, rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        drop(manual_watch(&mut coordinator, &path));

        wait_for_error(&rx, ErrorKind::Watch);
        coordinator.drain();
        assert!(!coordinator.is_tracking());
        assert_eq!(coordinator.stats().snapshot().watch_errors, 1);
    }

    #[test]
    fn test_changed_signal_reads_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.txt");
        std::fs::write(&path, "=== CHANNEL: fleet ===\n").unwrap();

        let (tx, _rx) = unbounded();
        let mut coordinator = Coordinator::new(poll_config(), tx);
        coordinator.switch_file(&path).unwrap();
        let signals = manual_watch(&mut coordinator, &path);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"[ 2024.03.01 18:00:01 ] A > one\n").unwrap();
        signals.send(WatchSignal::Changed).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while coordinator.stats().snapshot().lines_read < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(coordinator.channel_state().messages.len(), 1);
        coordinator.stop();
    }
}
