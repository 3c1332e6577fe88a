// Worker pool - bounded job queue with explicit backpressure
//
// The control thread submits jobs and never waits on their completion.
// With `DropOldest` a full queue discards its oldest job to make room;
// with `Block` submission waits up to a timeout, then gives up.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What happens when the job queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backpressure {
    /// Discard the oldest queued job
    #[default]
    DropOldest,
    /// Wait up to `timeout_ms` for room, then reject the new job
    Block { timeout_ms: u64 },
}

/// Outcome of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// Queued after discarding the oldest queued job
    DisplacedOldest,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool needs at least one worker")]
    NoWorkers,

    #[error("Worker pool queue capacity must be > 0")]
    ZeroCapacity,

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    // Submit side handle on the queue, used to evict the oldest job
    evict: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    backpressure: Backpressure,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn new(
        workers: usize,
        capacity: usize,
        backpressure: Backpressure,
    ) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let (sender, receiver) = bounded::<Job>(capacity);
        let counters = Arc::new(Counters::default());

        let handles = (0..workers)
            .map(|index| {
                let receiver = receiver.clone();
                let counters = Arc::clone(&counters);
                thread::Builder::new()
                    .name(format!("trigger-worker-{}", index))
                    .spawn(move || worker_loop(receiver, counters))
                    .map_err(|e| PoolError::Spawn(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            sender: Some(sender),
            evict: receiver,
            workers: handles,
            backpressure,
            counters,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    /// Queues `job`. Never waits for the job itself to run.
    pub fn submit(&self, job: Job) -> Submission {
        let Some(sender) = self.sender.as_ref() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Submission::Rejected;
        };

        let outcome = match self.backpressure {
            Backpressure::DropOldest => self.submit_drop_oldest(sender, job),
            Backpressure::Block { timeout_ms } => {
                match sender.send_timeout(job, Duration::from_millis(timeout_ms)) {
                    Ok(()) => Submission::Queued,
                    Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => {
                        Submission::Rejected
                    }
                }
            }
        };

        match outcome {
            Submission::Rejected => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
            Submission::Queued | Submission::DisplacedOldest => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
        }
        outcome
    }

    fn submit_drop_oldest(&self, sender: &Sender<Job>, mut job: Job) -> Submission {
        let mut displaced = false;
        loop {
            match sender.try_send(job) {
                Ok(()) => {
                    return if displaced {
                        Submission::DisplacedOldest
                    } else {
                        Submission::Queued
                    };
                }
                Err(TrySendError::Full(returned)) => {
                    job = returned;
                    // A worker may have emptied a slot in the meantime
                    if self.evict.try_recv().is_ok() {
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        displaced = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Submission::Rejected,
            }
        }
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.evict.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Stops accepting jobs, runs what is queued, and joins the workers
    pub fn shutdown(mut self) -> PoolStats {
        self.close();
        self.counters.snapshot()
    }

    fn close(&mut self) {
        // Workers exit once the queue is empty and the sender is gone
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Trigger worker exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(receiver: Receiver<Job>, counters: Arc<Counters>) {
    while let Ok(job) = receiver.recv() {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                log::error!("Trigger job panicked; worker continues");
            }
        }
    }
}
