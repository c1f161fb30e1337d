//! Persistent tier: one file per entry below a namespace directory.
//!
//! Every operation is queued to the background workers and reports its
//! outcome through a [`Completion`] (or a raw [`Callback`] for callers that
//! want to continue on the worker thread). Nothing here blocks the caller.
//!
//! The filesystem is the index: no manifest is kept, and statistics are
//! computed by walking the namespace directory on demand.

mod migrate;
mod ops;
mod sweep;
mod worker;

pub use migrate::MigrateResult;
pub use ops::ClearResult;
pub use sweep::CleanupReport;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::completion::{Callback, Completion};
use crate::cache::key::KeyCodec;
use crate::cache::stats::{DiskStatistics, StatsRecorder};
use crate::cache::types::{CacheError, CacheKey, Namespace};
use worker::{BulkTask, Job, Router};

/// Deferred encoder run on a disk worker.
pub type EncodeFn = Box<dyn FnOnce() -> Result<Vec<u8>, CacheError> + Send + 'static>;

/// Bytes to persist, either ready or produced on the worker.
pub enum WritePayload {
    Bytes(Vec<u8>),
    Encode(EncodeFn),
}

impl WritePayload {
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>, CacheError> {
        match self {
            WritePayload::Bytes(bytes) => Ok(bytes),
            WritePayload::Encode(encode) => encode(),
        }
    }
}

impl From<Vec<u8>> for WritePayload {
    fn from(bytes: Vec<u8>) -> Self {
        WritePayload::Bytes(bytes)
    }
}

impl fmt::Debug for WritePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePayload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            WritePayload::Encode(_) => f.write_str("Encode(..)"),
        }
    }
}

/// Disk tier backed by a pool of ordered worker queues.
pub struct DiskTier {
    codec: KeyCodec,
    router: Arc<Mutex<Router>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<StatsRecorder>,
}

impl DiskTier {
    /// Start the disk tier with `io_workers` background threads.
    ///
    /// The cache directory is created lazily on the first write.
    pub fn new(
        cache_dir: impl Into<std::path::PathBuf>,
        io_workers: usize,
        stats: Arc<StatsRecorder>,
    ) -> Result<Self, CacheError> {
        if io_workers == 0 {
            return Err(CacheError::InvalidConfig(
                "at least one disk worker is required".to_string(),
            ));
        }

        let codec = KeyCodec::new(cache_dir);
        let (router, workers) = worker::spawn_workers(io_workers, Arc::clone(&stats))
            .map_err(|e| CacheError::io(codec.cache_dir(), e))?;

        info!(
            cache_dir = %codec.cache_dir().display(),
            io_workers,
            "Disk cache tier started"
        );

        Ok(Self {
            codec,
            router,
            workers: Mutex::new(workers),
            stats,
        })
    }

    pub fn key_codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn cache_dir(&self) -> &Path {
        self.codec.cache_dir()
    }

    /// Queue a durable write, reporting to `callback` on the worker.
    pub fn write_with(
        &self,
        namespace: &Namespace,
        key: &CacheKey,
        payload: WritePayload,
        callback: Callback<()>,
    ) {
        let path = self.codec.path_for(namespace, key);
        debug!(namespace = %namespace, key = %key, "Queueing disk write");
        self.submit(|router| router.submit_write(path, payload, callback));
    }

    /// Queue a durable write.
    pub fn write_async(
        &self,
        namespace: &Namespace,
        key: &CacheKey,
        payload: impl Into<WritePayload>,
    ) -> Completion<()> {
        let (callback, completion) = Completion::channel();
        self.write_with(namespace, key, payload.into(), callback);
        completion
    }

    /// Queue a read behind any pending write for the same key.
    ///
    /// The callback receives `None` when the entry is not on disk.
    pub fn read_with(
        &self,
        namespace: &Namespace,
        key: &CacheKey,
        callback: Callback<Option<Vec<u8>>>,
    ) {
        let path = self.codec.path_for(namespace, key);
        self.submit(|router| router.submit_read(path, callback));
    }

    pub fn read_async(&self, namespace: &Namespace, key: &CacheKey) -> Completion<Option<Vec<u8>>> {
        let (callback, completion) = Completion::channel();
        self.read_with(namespace, key, callback);
        completion
    }

    /// Queue a removal; the callback receives whether a file was removed.
    pub fn remove_with(&self, namespace: &Namespace, key: &CacheKey, callback: Callback<bool>) {
        let path = self.codec.path_for(namespace, key);
        self.submit(|router| router.submit_remove(path, callback));
    }

    /// Delete an entry. Resolves to whether a file was removed.
    pub fn remove(&self, namespace: &Namespace, key: &CacheKey) -> Completion<bool> {
        let (callback, completion) = Completion::channel();
        self.remove_with(namespace, key, callback);
        completion
    }

    /// Delete every file of a namespace.
    pub fn clear_all(&self, namespace: &Namespace) -> Completion<ClearResult> {
        let directory = self.codec.namespace_directory(namespace);
        let name = namespace.clone();
        self.bulk(move || {
            let result = ops::clear_namespace(&directory)?;
            info!(
                namespace = %name,
                files_deleted = result.files_deleted,
                bytes_freed = result.bytes_freed,
                "Disk cache namespace cleared"
            );
            Ok(result)
        })
    }

    /// Expire entries older than `max_age`, then trim to `max_size` if set.
    pub fn cleanup(
        &self,
        namespace: &Namespace,
        max_age: Duration,
        max_size: Option<u64>,
    ) -> Completion<CleanupReport> {
        let directory = self.codec.namespace_directory(namespace);
        let stats = Arc::clone(&self.stats);
        self.bulk(move || {
            let report = sweep::cleanup(&directory, max_age, max_size, SystemTime::now())?;
            stats.record_cleanup(report.expired_removed, report.trimmed_removed);
            Ok(report)
        })
    }

    /// Move every entry from one namespace into another.
    pub fn migrate_namespace(&self, from: &Namespace, to: &Namespace) -> Completion<MigrateResult> {
        let from_dir = self.codec.namespace_directory(from);
        let to_dir = self.codec.namespace_directory(to);
        self.bulk(move || migrate::migrate(&from_dir, &to_dir))
    }

    /// Size, count and age range of a namespace, computed by walking it.
    pub fn statistics(&self, namespace: &Namespace) -> Completion<DiskStatistics> {
        let (callback, completion) = Completion::channel();
        self.statistics_with(namespace, callback);
        completion
    }

    pub fn statistics_with(&self, namespace: &Namespace, callback: Callback<DiskStatistics>) {
        let directory = self.codec.namespace_directory(namespace);
        self.bulk_with(callback, move || ops::statistics(&directory));
    }

    /// Move one entry to a different key. Resolves to whether it existed.
    ///
    /// The two paths may belong to different workers, so this is fenced like
    /// the namespace-wide operations.
    pub fn move_entry(
        &self,
        namespace: &Namespace,
        from: &CacheKey,
        to: &CacheKey,
    ) -> Completion<bool> {
        let from_path = self.codec.path_for(namespace, from);
        let to_path = self.codec.path_for(namespace, to);
        self.bulk(move || ops::move_entry(&from_path, &to_path))
    }

    /// Finish queued work, then stop the workers.
    ///
    /// Operations submitted afterwards fail with
    /// [`CacheError::WorkerUnavailable`]. Calling this more than once is a
    /// no-op.
    pub fn shutdown(&self) {
        if !self.router.lock().close() {
            return;
        }

        let current = thread::current().id();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            // A completion running on a worker may drop the last handle
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Disk cache worker thread panicked");
            }
        }
        debug!("Disk cache tier shut down");
    }

    fn bulk<T, F>(&self, op: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CacheError> + Send + 'static,
    {
        let (callback, completion) = Completion::channel();
        self.bulk_with(callback, op);
        completion
    }

    fn bulk_with<T, F>(&self, callback: Callback<T>, op: F)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CacheError> + Send + 'static,
    {
        let task: BulkTask = Box::new(move |ready| callback(ready.and_then(|()| op())));
        self.submit(|router| router.submit_bulk(task));
    }

    /// Hand a job to the router, resolving it here if no worker will run it.
    fn submit(&self, submit: impl FnOnce(&mut Router) -> Option<Job>) {
        let rejected = submit(&mut *self.router.lock());
        // The router lock is released, so the callback may submit again
        if let Some(job) = rejected {
            job.abandon(CacheError::WorkerUnavailable);
        }
    }
}

impl Drop for DiskTier {
    fn drop(&mut self) {
        self.shutdown();
    }
}
