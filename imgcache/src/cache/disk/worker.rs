//! Disk worker threads and job routing.
//!
//! Each worker owns one queue and executes its jobs strictly in order. Key
//! operations are routed to a worker by hashing the entry path, so every
//! operation on the same file lands on the same queue in submission order.
//!
//! Namespace-wide operations are fenced: the first worker receives the bulk
//! job, every other worker receives a fence marker, and all of them meet at a
//! barrier before the bulk job runs and again after it finishes. All sends go
//! through the [`Router`] lock so every queue sees fences in the same order.
//!
//! Consecutive writes to the same path with no read or removal between them
//! are coalesced: a newer write supersedes the previous one, which skips the
//! disk and hands its completion to the newer write. Every caller of the
//! chain observes the outcome of the write that actually lands.
//!
//! Submissions rejected after shutdown are handed back to the caller, which
//! resolves them once the router lock is released.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::ops;
use super::WritePayload;
use crate::cache::completion::Callback;
use crate::cache::key::StoragePath;
use crate::cache::stats::StatsRecorder;
use crate::cache::types::CacheError;

/// Namespace-wide job run on the first worker while the others are fenced.
///
/// Receives `Ok(())` when it may run, or the error to report if it never will.
pub(crate) type BulkTask = Box<dyn FnOnce(Result<(), CacheError>) + Send + 'static>;

/// Work item on a worker queue.
pub(crate) enum Job {
    Write {
        path: StoragePath,
        payload: WritePayload,
        ticket: WriteTicket,
        callback: Callback<()>,
    },
    Read {
        path: StoragePath,
        callback: Callback<Option<Vec<u8>>>,
    },
    Remove {
        path: StoragePath,
        callback: Callback<bool>,
    },
    Bulk {
        task: BulkTask,
        fence: Arc<Fence>,
    },
    Fence(Arc<Fence>),
    Shutdown,
}

impl Job {
    /// Resolve the job's completion without running it.
    pub(crate) fn abandon(self, error: CacheError) {
        match self {
            Job::Write { callback, .. } => callback(Err(error)),
            Job::Read { callback, .. } => callback(Err(error)),
            Job::Remove { callback, .. } => callback(Err(error)),
            Job::Bulk { task, .. } => task(Err(error)),
            Job::Fence(_) | Job::Shutdown => {}
        }
    }
}

/// Rendezvous shared by every worker for one bulk job.
pub(crate) struct Fence {
    arrived: Barrier,
    released: Barrier,
}

impl Fence {
    fn new(workers: usize) -> Self {
        Self {
            arrived: Barrier::new(workers),
            released: Barrier::new(workers),
        }
    }
}

/// Coalescing state shared between a queued write and the write that
/// supersedes it.
#[derive(Default)]
pub(crate) struct WriteSlot {
    successor: Mutex<Option<Arc<WriteSlot>>>,
    waiters: Mutex<Vec<Callback<()>>>,
}

impl WriteSlot {
    fn successor(&self) -> Option<Arc<WriteSlot>> {
        self.successor.lock().clone()
    }

    fn take_waiters(&self) -> Vec<Callback<()>> {
        std::mem::take(&mut *self.waiters.lock())
    }
}

/// Identity of a queued write, used for coalescing.
pub(crate) struct WriteTicket {
    seq: u64,
    slot: Arc<WriteSlot>,
}

struct PendingWrite {
    seq: u64,
    slot: Arc<WriteSlot>,
}

/// Submission side of the worker pool.
pub(crate) struct Router {
    senders: Vec<mpsc::UnboundedSender<Job>>,
    pending: HashMap<PathBuf, PendingWrite>,
    next_seq: u64,
}

impl Router {
    /// Queue a write, superseding any earlier write still pending for the path.
    ///
    /// Returns the job if no worker is running.
    #[must_use]
    pub(crate) fn submit_write(
        &mut self,
        path: StoragePath,
        payload: WritePayload,
        callback: Callback<()>,
    ) -> Option<Job> {
        if self.senders.is_empty() {
            return Some(Job::Write {
                path,
                payload,
                ticket: WriteTicket {
                    seq: 0,
                    slot: Arc::default(),
                },
                callback,
            });
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let slot = Arc::new(WriteSlot::default());

        let previous = self.pending.insert(
            path.path().to_path_buf(),
            PendingWrite {
                seq,
                slot: Arc::clone(&slot),
            },
        );
        if let Some(previous) = previous {
            *previous.slot.successor.lock() = Some(Arc::clone(&slot));
        }

        let ticket = WriteTicket { seq, slot };
        self.send_keyed(Job::Write {
            path,
            payload,
            ticket,
            callback,
        })
    }

    #[must_use]
    pub(crate) fn submit_read(
        &mut self,
        path: StoragePath,
        callback: Callback<Option<Vec<u8>>>,
    ) -> Option<Job> {
        // The read must observe the pending write, so it can no longer be skipped
        self.pending.remove(path.path());
        self.send_keyed(Job::Read { path, callback })
    }

    #[must_use]
    pub(crate) fn submit_remove(
        &mut self,
        path: StoragePath,
        callback: Callback<bool>,
    ) -> Option<Job> {
        self.pending.remove(path.path());
        self.send_keyed(Job::Remove { path, callback })
    }

    /// Queue a namespace-wide job behind everything already submitted.
    #[must_use]
    pub(crate) fn submit_bulk(&mut self, task: BulkTask) -> Option<Job> {
        self.pending.clear();

        let fence = Arc::new(Fence::new(self.senders.len().max(1)));
        if self.senders.is_empty() {
            return Some(Job::Bulk { task, fence });
        }

        for sender in &self.senders[1..] {
            if sender.send(Job::Fence(Arc::clone(&fence))).is_err() {
                warn!("Disk worker queue closed while fencing");
            }
        }
        self.senders[0]
            .send(Job::Bulk { task, fence })
            .err()
            .map(|mpsc::error::SendError(job)| job)
    }

    fn send_keyed(&self, job: Job) -> Option<Job> {
        let shard = match job_path(&job) {
            Some(path) if !self.senders.is_empty() => shard_for(path.path(), self.senders.len()),
            _ => return Some(job),
        };
        self.senders[shard]
            .send(job)
            .err()
            .map(|mpsc::error::SendError(job)| job)
    }

    fn complete_write(&mut self, path: &StoragePath, seq: u64) {
        if self
            .pending
            .get(path.path())
            .is_some_and(|pending| pending.seq == seq)
        {
            self.pending.remove(path.path());
        }
    }

    /// Close every queue behind a shutdown marker. Returns whether any were open.
    pub(crate) fn close(&mut self) -> bool {
        let senders = std::mem::take(&mut self.senders);
        for sender in &senders {
            let _ = sender.send(Job::Shutdown);
        }
        self.pending.clear();
        !senders.is_empty()
    }
}

fn job_path(job: &Job) -> Option<&StoragePath> {
    match job {
        Job::Write { path, .. } | Job::Read { path, .. } | Job::Remove { path, .. } => Some(path),
        _ => None,
    }
}

fn shard_for(path: &std::path::Path, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Spawn `count` workers and return the shared router with their handles.
pub(crate) fn spawn_workers(
    count: usize,
    stats: Arc<StatsRecorder>,
) -> std::io::Result<(Arc<Mutex<Router>>, Vec<JoinHandle<()>>)> {
    let mut senders = Vec::with_capacity(count);
    let mut receivers = Vec::with_capacity(count);
    for _ in 0..count {
        let (sender, receiver) = mpsc::unbounded_channel();
        senders.push(sender);
        receivers.push(receiver);
    }

    let router = Arc::new(Mutex::new(Router {
        senders,
        pending: HashMap::new(),
        next_seq: 0,
    }));

    let mut handles = Vec::with_capacity(count);
    for (index, receiver) in receivers.into_iter().enumerate() {
        let worker = Worker {
            index,
            router: Arc::clone(&router),
            stats: Arc::clone(&stats),
        };
        let spawned = thread::Builder::new()
            .name(format!("imgcache-io-{index}"))
            .spawn(move || worker.run(receiver));

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                // Stop whatever already started before reporting
                router.lock().close();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(e);
            }
        }
    }

    debug!(workers = count, "Disk cache workers started");
    Ok((router, handles))
}

struct Worker {
    index: usize,
    router: Arc<Mutex<Router>>,
    stats: Arc<StatsRecorder>,
}

impl Worker {
    fn run(self, mut receiver: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = receiver.blocking_recv() {
            match job {
                Job::Shutdown => break,
                Job::Fence(fence) => {
                    fence.arrived.wait();
                    fence.released.wait();
                }
                Job::Bulk { task, fence } => {
                    fence.arrived.wait();
                    self.contain("bulk", || task(Ok(())));
                    fence.released.wait();
                }
                job => self.contain("key", || self.execute(job)),
            }
        }
        trace!(worker = self.index, "Disk cache worker stopped");
    }

    /// Run a job, logging instead of unwinding out of the worker loop.
    fn contain(&self, kind: &str, job: impl FnOnce()) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(worker = self.index, kind, panic = %message, "Disk cache job panicked");
        }
    }

    fn execute(&self, job: Job) {
        match job {
            Job::Write {
                path,
                payload,
                ticket,
                callback,
            } => {
                if let Some(successor) = ticket.slot.successor() {
                    self.stats.record_write_coalesced();
                    trace!(path = %path.path().display(), "Write superseded by a newer one");
                    let mut waiters = successor.waiters.lock();
                    waiters.extend(ticket.slot.take_waiters());
                    waiters.push(callback);
                    return;
                }

                let result = self.write(&path, payload);
                self.router.lock().complete_write(&path, ticket.seq);
                for waiter in ticket.slot.take_waiters() {
                    waiter(result.as_ref().map(|_| ()).map_err(CacheError::duplicate));
                }
                callback(result);
            }
            Job::Read { path, callback } => {
                let result = ops::read_entry(&path);
                match &result {
                    Ok(Some(_)) => self.stats.record_disk_hit(),
                    Ok(None) => self.stats.record_disk_miss(),
                    Err(e) => {
                        self.stats.record_disk_read_failure();
                        warn!(error = %e, "Disk cache read failed");
                    }
                }
                callback(result);
            }
            Job::Remove { path, callback } => {
                let result = ops::remove_entry(path.path());
                if let Ok(true) = result {
                    self.stats.record_disk_removal();
                }
                callback(result);
            }
            Job::Bulk { .. } | Job::Fence(_) | Job::Shutdown => {}
        }
    }

    fn write(&self, path: &StoragePath, payload: WritePayload) -> Result<(), CacheError> {
        let bytes = match payload.into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_codec_failure();
                return Err(e);
            }
        };

        match ops::write_entry(path, &bytes) {
            Ok(()) => {
                self.stats.record_disk_write();
                trace!(path = %path.path().display(), bytes = bytes.len(), "Entry written");
                Ok(())
            }
            Err(e) => {
                self.stats.record_disk_write_failure();
                warn!(error = %e, "Disk cache write failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_stable_per_path() {
        let path = std::path::Path::new("/cache/default/abc.cache");
        let first = shard_for(path, 4);
        for _ in 0..10 {
            assert_eq!(shard_for(path, 4), first);
        }
        assert_eq!(shard_for(path, 1), 0);
    }

    #[test]
    fn test_shard_spreads_paths() {
        let shards: std::collections::HashSet<_> = (0..64)
            .map(|n| shard_for(std::path::Path::new(&format!("/cache/ns/{n}.cache")), 4))
            .collect();
        assert!(shards.len() > 1);
    }
}
