//! Core types for the cache system.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::codec::CodecError;

/// Namespace used when none is configured, and as the migration target
/// when a caller does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Cache key uniquely identifying one cached resource.
///
/// Keys are opaque caller-supplied strings (usually the source URL) and are
/// compared byte-for-byte. The only rejected key is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a new cache key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for an empty key.
    pub fn new(key: impl Into<String>) -> Result<Self, CacheError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(Self(key))
    }

    /// The key as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = CacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Logical partition of the disk cache.
///
/// Every namespace maps to exactly one directory below the cache root, so the
/// name must be a single, non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace, validating that it is usable as a directory name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidNamespace`] if the name is empty, is `.`
    /// or `..`, or contains a path separator or NUL byte.
    pub fn new(name: impl Into<String>) -> Result<Self, CacheError> {
        let name = name.into();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(CacheError::InvalidNamespace(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tier a query result was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    /// Not cached in either tier.
    None,
    /// Read from the disk tier (and promoted to memory).
    Disk,
    /// Served from the memory tier.
    Memory,
}

/// Severity of a host memory-pressure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    /// Shed the least recently used half of the memory budget.
    Moderate,
    /// Drop every in-memory entry.
    Critical,
}

/// Cache-related errors.
///
/// A cache miss is not an error; lookups report absence as `None`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key rejected before any I/O was attempted
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Namespace cannot be used as a directory name
    #[error("Invalid cache namespace '{0}'")]
    InvalidNamespace(String),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error during a disk tier operation
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding the entry failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Some files could not be moved to the target namespace
    #[error("Namespace migration incomplete: {moved} moved, {failed} failed: {source}")]
    MigrationIncomplete {
        moved: u64,
        failed: u64,
        #[source]
        source: std::io::Error,
    },

    /// The disk workers have shut down
    #[error("Disk cache workers are no longer running")]
    WorkerUnavailable,
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Copy of this error for every caller sharing one outcome.
    ///
    /// `io::Error` is not `Clone`; copies keep its kind and message.
    pub(crate) fn duplicate(&self) -> Self {
        let io = |e: &std::io::Error| std::io::Error::new(e.kind(), e.to_string());
        match self {
            Self::InvalidKey(key) => Self::InvalidKey(key.clone()),
            Self::InvalidNamespace(name) => Self::InvalidNamespace(name.clone()),
            Self::InvalidConfig(message) => Self::InvalidConfig(message.clone()),
            Self::Io { path, source } => Self::Io {
                path: path.clone(),
                source: io(source),
            },
            Self::Codec(e) => Self::Codec(e.clone()),
            Self::MigrationIncomplete {
                moved,
                failed,
                source,
            } => Self::MigrationIncomplete {
                moved: *moved,
                failed: *failed,
                source: io(source),
            },
            Self::WorkerUnavailable => Self::WorkerUnavailable,
        }
    }
}
