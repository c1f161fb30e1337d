//! Cache path construction from namespaces and keys.
//!
//! Keys are never sanitized, only hashed, so hostile keys (`../../etc`,
//! NUL bytes, very long URLs) all map to a fixed-length hex file name:
//!
//! ```text
//! <cache_dir>/<namespace>/<sha256(key)>.cache
//! ```
//!
//! The namespace only selects the directory. A file therefore keeps its name
//! when it is migrated from one namespace to another.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::cache::types::{CacheKey, Namespace};

/// Extension of committed cache entries.
pub const ENTRY_EXTENSION: &str = "cache";

/// Extension of in-flight writes that have not been renamed into place yet.
pub const TEMP_EXTENSION: &str = "tmp";

/// Location of one cache entry on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    path: PathBuf,
}

impl StoragePath {
    /// Full path of the committed entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding every entry of the namespace.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// Sibling path used while a write is in flight.
    pub fn temp_path(&self) -> PathBuf {
        self.path.with_extension(TEMP_EXTENSION)
    }

    /// File name shared by this entry in every namespace.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Deterministic mapping from `(namespace, key)` to a filesystem location.
///
/// Pure and stateless: the same inputs produce the same path in every process.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    cache_dir: PathBuf,
}

impl KeyCodec {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory that contains one directory per namespace.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Storage path for a key in a namespace.
    ///
    /// # Example
    ///
    /// ```
    /// use imgcache::cache::{CacheKey, KeyCodec, Namespace};
    ///
    /// let codec = KeyCodec::new("/cache");
    /// let ns = Namespace::new("avatars").unwrap();
    /// let key = CacheKey::new("https://example.com/a.png").unwrap();
    ///
    /// let path = codec.path_for(&ns, &key);
    /// assert!(path.path().starts_with("/cache/avatars"));
    /// assert_eq!(path, codec.path_for(&ns, &key));
    /// ```
    pub fn path_for(&self, namespace: &Namespace, key: &CacheKey) -> StoragePath {
        StoragePath {
            path: self
                .namespace_directory(namespace)
                .join(Self::key_to_filename(key)),
        }
    }

    /// Directory holding every entry of a namespace.
    pub fn namespace_directory(&self, namespace: &Namespace) -> PathBuf {
        self.cache_dir.join(namespace.as_str())
    }

    /// File name for a key: lowercase hex SHA-256 plus the entry extension.
    pub fn key_to_filename(key: &CacheKey) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        format!("{:x}.{}", digest, ENTRY_EXTENSION)
    }
}

/// Whether a path names a committed cache entry.
pub(crate) fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// Whether a path names an in-flight (or orphaned) write.
pub(crate) fn is_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TEMP_EXTENSION)
}
