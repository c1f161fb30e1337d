//! Settings structs for the configuration file sections.
//!
//! Pure data: parsing lives in [`super::parser`], serialization in
//! [`super::writer`].

use std::path::PathBuf;

use crate::cache::{
    default_cache_directory, DEFAULT_IO_WORKERS, DEFAULT_MAX_AGE, DEFAULT_MEMORY_SIZE,
    DEFAULT_NAMESPACE,
};
use crate::logging::{default_log_dir, DEFAULT_LOG_FILE};

/// Seconds per day, for `max_age_days`.
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Upper bound for `io_workers`.
pub const MAX_IO_WORKERS: usize = 64;

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Root directory holding one directory per namespace
    pub directory: PathBuf,
    /// Active namespace
    pub namespace: String,
    /// Memory tier budget in bytes
    pub memory_size: u64,
    /// Disk size ceiling in bytes; `None` for age-only cleanup
    pub disk_size: Option<u64>,
    /// Maximum entry age in days
    pub max_age_days: u64,
    /// Number of disk worker threads
    pub io_workers: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            memory_size: DEFAULT_MEMORY_SIZE as u64,
            disk_size: None,
            max_age_days: DEFAULT_MAX_AGE.as_secs() / SECONDS_PER_DAY,
            io_workers: DEFAULT_IO_WORKERS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for log files
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
