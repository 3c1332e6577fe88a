// Writer thread - single owner of a sink, draining a bounded queue

use super::{AtomicSinkStatus, SinkError, SinkStatus};
use crossbeam_channel::{Sender, bounded};
use std::thread::{self, JoinHandle};

/// Cloneable enqueue side of a writer thread
#[derive(Debug)]
pub struct WriterHandle<C> {
    sender: Sender<C>,
}

impl<C> Clone for WriterHandle<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<C: Send> WriterHandle<C> {
    /// Blocks while the queue is full; fails once the writer has stopped
    pub fn send(&self, command: C) -> Result<(), SinkError> {
        self.sender.send(command).map_err(|_| SinkError::Closed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub failed: u64,
    /// `Faulted` once any write failed
    pub status: SinkStatus,
}

/// The thread owning the sink. Stops once every `WriterHandle` is dropped
/// and the queue is drained.
#[derive(Debug)]
pub struct WriterThread {
    name: String,
    status: AtomicSinkStatus,
    handle: Option<JoinHandle<WriterStats>>,
}

impl WriterThread {
    pub fn spawn<C, F>(
        name: &str,
        capacity: usize,
        mut handler: F,
    ) -> Result<(WriterHandle<C>, WriterThread), SinkError>
    where
        C: Send + 'static,
        F: FnMut(C) -> Result<(), SinkError> + Send + 'static,
    {
        let (sender, receiver) = bounded::<C>(capacity.max(1));
        let status = AtomicSinkStatus::new(SinkStatus::Connected);
        let thread_status = status.clone();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut stats = WriterStats::default();
                for command in receiver.iter() {
                    match handler(command) {
                        Ok(()) => stats.written += 1,
                        Err(e) => {
                            stats.failed += 1;
                            if stats.failed == 1 {
                                log::warn!("{}: {}", thread_name, e);
                                thread_status.set(SinkStatus::Faulted);
                            } else {
                                log::debug!("{}: {}", thread_name, e);
                            }
                        }
                    }
                }
                stats
            })
            .map_err(|e| SinkError::Unavailable(format!("cannot spawn {}: {}", name, e)))?;

        Ok((
            WriterHandle { sender },
            WriterThread {
                name: name.to_string(),
                status,
                handle: Some(handle),
            },
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the queue to drain. Every handle must be dropped first,
    /// otherwise this blocks forever.
    pub fn join(mut self) -> WriterStats {
        self.join_inner()
    }

    fn join_inner(&mut self) -> WriterStats {
        let mut stats = match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::error!("{} panicked", self.name);
                self.status.set(SinkStatus::Faulted);
                WriterStats::default()
            }),
            None => WriterStats::default(),
        };
        stats.status = self.status.get();
        stats
    }
}
