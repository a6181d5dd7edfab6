//! Ordered task queue
//!
//! Work items run one at a time, strictly in the order they were enqueued,
//! on a single runner thread. A failing or panicking item is reported to the
//! error handler and the runner moves on to the next one.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// A unit of work for the runner
pub type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

enum QueueMessage {
    Run { ticket: u64, job: Job },
    Barrier(Sender<()>),
}

/// FIFO of work items drained by exactly one runner thread
pub struct OrderedQueue {
    sender: Option<Sender<QueueMessage>>,
    runner: Option<thread::JoinHandle<()>>,
    next_ticket: AtomicU64,
    pending: Arc<AtomicUsize>,
}

impl OrderedQueue {
    /// Spawn the runner. `on_error` receives every failure, including panics.
    pub fn new<F>(on_error: F) -> Self
    where
        F: Fn(anyhow::Error) + Send + 'static,
    {
        let (sender, receiver) = unbounded::<QueueMessage>();
        let pending = Arc::new(AtomicUsize::new(0));
        let runner_pending = Arc::clone(&pending);

        let runner = thread::spawn(move || {
            for message in receiver {
                match message {
                    QueueMessage::Run { ticket, job } => {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                        let failure = match outcome {
                            Ok(Ok(())) => None,
                            Ok(Err(err)) => Some(err),
                            Err(payload) => Some(anyhow!(
                                "work item {} panicked: {}",
                                ticket,
                                panic_message(payload.as_ref())
                            )),
                        };
                        runner_pending.fetch_sub(1, Ordering::SeqCst);
                        if let Some(err) = failure {
                            tracing::debug!(ticket, error = %err, "work item failed");
                            on_error(err);
                        }
                    }
                    QueueMessage::Barrier(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("queue runner exiting");
        });

        Self {
            sender: Some(sender),
            runner: Some(runner),
            next_ticket: AtomicU64::new(0),
            pending,
        }
    }

    /// Append `work` to the tail of the queue and return immediately.
    pub fn enqueue<F>(&self, work: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let Some(sender) = &self.sender else {
            return;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let message = QueueMessage::Run {
            ticket,
            job: Box::new(work),
        };
        if sender.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(ticket, "queue runner is gone; dropping work item");
        }
    }

    /// Block until every item enqueued before this call has settled.
    pub fn wait_idle(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if sender.send(QueueMessage::Barrier(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Items enqueued but not yet settled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Total items ever enqueued
    pub fn enqueued(&self) -> u64 {
        self.next_ticket.load(Ordering::SeqCst)
    }
}

impl Drop for OrderedQueue {
    fn drop(&mut self) {
        // Closing the channel lets the runner drain what is left and exit
        self.sender.take();
        if let Some(runner) = self.runner.take() {
            if runner.join().is_err() {
                tracing::error!("queue runner thread panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
