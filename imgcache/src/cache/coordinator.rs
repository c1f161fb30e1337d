//! Two-tier image cache facade.
//!
//! [`ImageCache`] keeps the memory and disk tiers consistent:
//!
//! - A store updates memory synchronously and queues the disk write.
//! - A query answers from memory on the calling thread, otherwise reads the
//!   disk tier in the background, decodes the bytes on the worker and promotes
//!   the image into memory before resolving.
//! - Removal, cleanup and migration are forwarded to the tiers.
//!
//! Disk paths are recomputed from the active namespace on every call, so a
//! namespace switch or migration never leaves stale paths behind.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::codec::{ImageCodec, RasterCodec};
use crate::cache::completion::Completion;
use crate::cache::config::CacheConfig;
use crate::cache::disk::{CleanupReport, ClearResult, DiskTier, MigrateResult, WritePayload};
use crate::cache::memory::MemoryTier;
use crate::cache::stats::{CacheStatistics, DiskStatistics, StatsRecorder};
use crate::cache::types::{CacheError, CacheKey, CacheType, MemoryPressure, Namespace};

static SHARED: OnceLock<Arc<ImageCache>> = OnceLock::new();

/// Result of a query.
#[derive(Debug)]
pub struct Lookup<I> {
    /// The decoded image, if either tier had it.
    pub image: Option<Arc<I>>,
    /// Tier the image was served from.
    pub cache_type: CacheType,
}

impl<I> Lookup<I> {
    fn miss() -> Self {
        Self {
            image: None,
            cache_type: CacheType::None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.image.is_some()
    }
}

/// Memory plus disk image cache.
///
/// Multiple independent instances may coexist, each with its own namespace
/// and directory. [`ImageCache::shared`] offers a lazily created default.
pub struct ImageCache<C: ImageCodec = RasterCodec> {
    config: CacheConfig,
    namespace: RwLock<Namespace>,
    codec: Arc<C>,
    memory: Arc<MemoryTier<Arc<C::Image>>>,
    disk: DiskTier,
    stats: Arc<StatsRecorder>,
}

impl ImageCache<RasterCodec> {
    /// Process-wide cache with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the disk workers cannot be started on first use.
    pub fn shared() -> Arc<Self> {
        let cache = SHARED.get_or_init(|| {
            let cache = Self::new(CacheConfig::default(), RasterCodec::default())
                .expect("failed to start the shared image cache");
            Arc::new(cache)
        });
        Arc::clone(cache)
    }
}

impl<C: ImageCodec + Default> ImageCache<C> {
    /// Create a cache using the codec's default settings.
    pub fn with_config(config: CacheConfig) -> Result<Self, CacheError> {
        Self::new(config, C::default())
    }
}

impl<C: ImageCodec> ImageCache<C> {
    /// Create a cache and start its disk workers.
    pub fn new(config: CacheConfig, codec: C) -> Result<Self, CacheError> {
        config.validate()?;

        let stats = Arc::new(StatsRecorder::new());
        let memory = Arc::new(MemoryTier::new(config.memory_size, Arc::clone(&stats)));
        let disk = DiskTier::new(&config.directory, config.io_workers, Arc::clone(&stats))?;

        info!(
            directory = %config.directory.display(),
            namespace = %config.namespace,
            memory_size = config.memory_size,
            max_age_secs = config.max_age.as_secs(),
            max_disk_size = ?config.max_disk_size,
            "Image cache created"
        );

        Ok(Self {
            namespace: RwLock::new(config.namespace.clone()),
            config,
            codec: Arc::new(codec),
            memory,
            disk,
            stats,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Active namespace.
    pub fn namespace(&self) -> Namespace {
        self.namespace.read().clone()
    }

    /// Switch the active namespace.
    ///
    /// The memory tier is cleared since its entries belong to the old
    /// namespace.
    pub fn set_namespace(&self, namespace: Namespace) {
        let mut current = self.namespace.write();
        if *current == namespace {
            return;
        }
        debug!(from = %*current, to = %namespace, "Switching cache namespace");
        *current = namespace;
        self.memory.clear();
    }

    /// Store an image.
    ///
    /// The memory tier is updated before this returns. With `to_disk` the
    /// entry is also persisted: `original_bytes` are written as-is when
    /// given, otherwise the image is encoded on the disk worker.
    pub fn store(
        &self,
        key: &str,
        image: impl Into<Arc<C::Image>>,
        original_bytes: Option<Vec<u8>>,
        to_disk: bool,
    ) -> Completion<()> {
        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => return Completion::ready(Err(e)),
        };
        let image = image.into();

        let cost = self.codec.cost(&image);
        self.memory.put(key.clone(), Arc::clone(&image), cost);

        if !to_disk {
            return Completion::ready(Ok(()));
        }

        let payload = match original_bytes {
            Some(bytes) => WritePayload::Bytes(bytes),
            None => {
                let codec = Arc::clone(&self.codec);
                WritePayload::Encode(Box::new(move || {
                    codec.encode(&image).map_err(CacheError::from)
                }))
            }
        };
        self.disk.write_async(&self.namespace(), &key, payload)
    }

    /// Store an image in both tiers, encoding it for disk.
    pub fn store_image(&self, key: &str, image: impl Into<Arc<C::Image>>) -> Completion<()> {
        self.store(key, image, None, true)
    }

    /// Look an image up in memory, then on disk.
    ///
    /// A memory hit resolves immediately. A disk hit is decoded and promoted
    /// into memory before the completion resolves. Missing in both tiers is a
    /// successful [`Lookup`] with no image.
    pub fn query(&self, key: &str) -> Completion<Lookup<C::Image>> {
        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => return Completion::ready(Err(e)),
        };

        if let Some(image) = self.memory.get(&key) {
            return Completion::ready(Ok(Lookup {
                image: Some(image),
                cache_type: CacheType::Memory,
            }));
        }

        // Captured before the namespace is read, so a concurrent switch or
        // removal always invalidates the promotion
        let generation = self.memory.generation();
        let namespace = self.namespace();

        let (callback, completion) = Completion::channel();
        let codec = Arc::clone(&self.codec);
        let memory = Arc::clone(&self.memory);
        let stats = Arc::clone(&self.stats);
        let path_key = key.clone();

        self.disk.read_with(
            &namespace,
            &path_key,
            Box::new(move |read| {
                let result = read.and_then(|bytes| {
                    let Some(bytes) = bytes else {
                        return Ok(Lookup::miss());
                    };
                    let image = codec.decode(&bytes).map_err(|e| {
                        stats.record_codec_failure();
                        CacheError::from(e)
                    })?;
                    let image = Arc::new(image);
                    memory.put_if_absent(key, Arc::clone(&image), codec.cost(&image), generation);
                    Ok(Lookup {
                        image: Some(image),
                        cache_type: CacheType::Disk,
                    })
                });
                callback(result);
            }),
        );
        completion
    }

    /// Synchronous memory-only lookup.
    pub fn lookup_memory_only(&self, key: &str) -> Option<Arc<C::Image>> {
        let key = CacheKey::new(key).ok()?;
        self.memory.get(&key)
    }

    /// Remove an entry from memory and, with `from_disk`, from disk.
    ///
    /// Resolves to whether anything was removed. Removing an absent key
    /// succeeds.
    pub fn remove(&self, key: &str, from_disk: bool) -> Completion<bool> {
        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => return Completion::ready(Err(e)),
        };

        let in_memory = self.memory.remove(&key).is_some();
        if !from_disk {
            return Completion::ready(Ok(in_memory));
        }

        let (callback, completion) = Completion::channel();
        self.disk.remove_with(
            &self.namespace(),
            &key,
            Box::new(move |removed| callback(removed.map(|on_disk| on_disk || in_memory))),
        );
        // A read queued ahead of the disk removal may already have promoted
        // the entry; this drops it and rejects any later promotion
        self.memory.remove(&key);
        completion
    }

    /// Remove an entry from both tiers.
    pub fn remove_image(&self, key: &str) -> Completion<bool> {
        self.remove(key, true)
    }

    /// Move one entry to a new key in both tiers.
    pub fn move_entry(&self, from_key: &str, to_key: &str) -> Completion<bool> {
        let (from, to) = match (CacheKey::new(from_key), CacheKey::new(to_key)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return Completion::ready(Err(e)),
        };

        if let Some(image) = self.memory.remove(&from) {
            let cost = self.codec.cost(&image);
            self.memory.put(to.clone(), image, cost);
        }
        let completion = self.disk.move_entry(&self.namespace(), &from, &to);
        self.memory.remove(&from);
        completion
    }

    /// Drop every in-memory entry.
    pub fn clear_memory(&self) {
        self.memory.clear();
        debug!("Memory tier cleared");
    }

    /// Delete every file of the active namespace.
    pub fn clear_disk(&self) -> Completion<ClearResult> {
        self.disk.clear_all(&self.namespace())
    }

    /// Expire old entries, then trim to the configured size ceiling.
    pub fn clean_disk(&self) -> Completion<CleanupReport> {
        self.disk.cleanup(
            &self.namespace(),
            self.config.max_age,
            self.config.max_disk_size,
        )
    }

    /// Move every disk entry from one namespace into another.
    ///
    /// Without a target the entries move into
    /// [`DEFAULT_NAMESPACE`](crate::cache::DEFAULT_NAMESPACE).
    pub fn move_entries(
        &self,
        from: &Namespace,
        to: Option<&Namespace>,
    ) -> Completion<MigrateResult> {
        let default = Namespace::default();
        let to = to.unwrap_or(&default);
        info!(from = %from, to = %to, "Migrating cache namespace");
        self.disk.migrate_namespace(from, to)
    }

    /// Total size in bytes of the active namespace on disk.
    pub fn size_on_disk(&self) -> Completion<u64> {
        let (callback, completion) = Completion::channel();
        self.disk.statistics_with(
            &self.namespace(),
            Box::new(move |stats| callback(stats.map(|s| s.total_size))),
        );
        completion
    }

    /// Number of entries of the active namespace on disk.
    pub fn count_on_disk(&self) -> Completion<u64> {
        let (callback, completion) = Completion::channel();
        self.disk.statistics_with(
            &self.namespace(),
            Box::new(move |stats| callback(stats.map(|s| s.file_count))),
        );
        completion
    }

    /// Size, count and age range of the active namespace on disk.
    pub fn disk_statistics(&self) -> Completion<DiskStatistics> {
        self.disk.statistics(&self.namespace())
    }

    /// Hit, miss and eviction counters plus current memory usage.
    pub fn stats(&self) -> CacheStatistics {
        let snapshot = self
            .stats
            .snapshot(self.memory.size_bytes(), self.memory.entry_count());
        CacheStatistics::from_stats(&snapshot)
    }

    /// Forward a host memory-pressure signal to the memory tier.
    pub fn on_memory_pressure(&self, level: MemoryPressure) {
        self.memory.on_memory_pressure(level);
    }

    /// Drain queued disk work and stop the workers.
    ///
    /// Later disk operations fail with [`CacheError::WorkerUnavailable`];
    /// the memory tier keeps working.
    pub fn shutdown(&self) {
        self.disk.shutdown();
    }
}
