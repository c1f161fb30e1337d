//! Two-tier image cache.
//!
//! A bounded in-memory LRU of decoded images in front of a persistent,
//! namespaced directory of encoded bytes. [`ImageCache`] is the entry point;
//! the tiers are public for callers that need only one of them.

mod codec;
mod completion;
mod config;
mod coordinator;
mod daemon;
mod disk;
mod key;
mod lru;
mod memory;
mod stats;
mod types;

pub use codec::{BytesCodec, CodecError, ImageCodec, RasterCodec};
pub use completion::{Callback, Completion};
pub use config::{
    default_cache_directory, CacheConfig, CACHE_DIR_NAME, DEFAULT_IO_WORKERS, DEFAULT_MAX_AGE,
    DEFAULT_MEMORY_SIZE,
};
pub use coordinator::{ImageCache, Lookup};
pub use daemon::{run_cleanup_daemon, run_memory_pressure_listener};
pub use disk::{CleanupReport, ClearResult, DiskTier, EncodeFn, MigrateResult, WritePayload};
pub use key::{KeyCodec, StoragePath, ENTRY_EXTENSION, TEMP_EXTENSION};
pub use memory::MemoryTier;
pub use stats::{CacheStatistics, CacheStats, DiskStatistics, StatsRecorder};
pub use types::{CacheError, CacheKey, CacheType, MemoryPressure, Namespace, DEFAULT_NAMESPACE};
