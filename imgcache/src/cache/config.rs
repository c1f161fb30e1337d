//! Configuration for an [`ImageCache`](super::ImageCache) instance.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::types::{CacheError, Namespace};

/// Default maximum entry age: one week.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default memory budget: 256 MB of decoded image data.
pub const DEFAULT_MEMORY_SIZE: usize = 256 * 1024 * 1024;

/// Default number of disk worker threads.
pub const DEFAULT_IO_WORKERS: usize = 1;

/// Directory name used below the platform cache directory.
pub const CACHE_DIR_NAME: &str = "imgcache";

/// Cache configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use imgcache::cache::{CacheConfig, Namespace};
///
/// let config = CacheConfig::new(Namespace::new("thumbnails").unwrap())
///     .with_directory("/tmp/imgcache")
///     .with_max_age(Duration::from_secs(3600))
///     .with_max_disk_size(64 * 1024 * 1024)
///     .with_io_workers(2);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding one directory per namespace.
    pub directory: PathBuf,
    /// Active namespace.
    pub namespace: Namespace,
    /// Entries last modified longer ago than this are expired by cleanup.
    pub max_age: Duration,
    /// Size ceiling applied by cleanup; `None` means age-only cleanup.
    pub max_disk_size: Option<u64>,
    /// Memory tier budget in bytes of decoded image cost.
    pub memory_size: usize,
    /// Number of disk worker threads.
    pub io_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(Namespace::default())
    }
}

impl CacheConfig {
    /// Configuration for a namespace with every other setting at its default.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            directory: default_cache_directory(),
            namespace,
            max_age: DEFAULT_MAX_AGE,
            max_disk_size: None,
            memory_size: DEFAULT_MEMORY_SIZE,
            io_workers: DEFAULT_IO_WORKERS,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_max_disk_size(mut self, bytes: u64) -> Self {
        self.max_disk_size = Some(bytes);
        self
    }

    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    pub fn with_io_workers(mut self, workers: usize) -> Self {
        self.io_workers = workers;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.io_workers == 0 {
            return Err(CacheError::InvalidConfig(
                "io_workers must be at least 1".to_string(),
            ));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "cache directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform cache directory joined with [`CACHE_DIR_NAME`].
///
/// Falls back to the system temp directory when the platform has none.
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}
