//! Blocking filesystem operations executed on the disk workers.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::cache::key::{is_entry_file, is_temp_file, StoragePath};
use crate::cache::stats::DiskStatistics;
use crate::cache::types::CacheError;

/// One committed entry found while walking a namespace directory.
#[derive(Debug, Clone)]
pub(crate) struct EntryFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Result of clearing a namespace directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Number of files deleted.
    pub files_deleted: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

/// Durably write an entry: temp file, fsync, then rename into place.
///
/// Readers either see the previous file or the complete new one.
pub(crate) fn write_entry(path: &StoragePath, data: &[u8]) -> Result<(), CacheError> {
    let directory = path.directory();
    fs::create_dir_all(directory).map_err(|e| CacheError::io(directory, e))?;

    let temp_path = path.temp_path();
    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(CacheError::io(temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path.path()) {
        let _ = fs::remove_file(&temp_path);
        return Err(CacheError::io(path.path(), e));
    }

    Ok(())
}

/// Read an entry; a missing file is a miss, not an error.
pub(crate) fn read_entry(path: &StoragePath) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path.path()) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path.path(), e)),
    }
}

/// Delete a file. Returns whether anything was removed.
pub(crate) fn remove_entry(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Move one entry to another location, replacing any entry already there.
///
/// Returns `false` if the source did not exist.
pub(crate) fn move_entry(from: &StoragePath, to: &StoragePath) -> Result<bool, CacheError> {
    if from == to {
        return Ok(from.path().exists());
    }
    let directory = to.directory();
    fs::create_dir_all(directory).map_err(|e| CacheError::io(directory, e))?;

    match move_file(from.path(), to.path()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(from.path(), e)),
    }
}

/// Rename a file, falling back to copy and delete across filesystems.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(rename_err) => {
            debug!(
                from = %from.display(),
                to = %to.display(),
                error = %rename_err,
                "Rename failed, falling back to copy"
            );
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Collect every committed entry in a namespace directory.
///
/// A missing directory is an empty namespace. Files that vanish or cannot be
/// stat'ed mid-walk are skipped.
pub(crate) fn collect_entries(directory: &Path) -> Result<Vec<EntryFile>, CacheError> {
    let mut entries = Vec::new();
    for_each_file(directory, |path, metadata| {
        if is_entry_file(&path) {
            entries.push(EntryFile {
                path,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
            });
        }
    })?;
    Ok(entries)
}

/// Paths of every in-flight or orphaned temp file in a namespace directory.
pub(crate) fn collect_temp_files(directory: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let mut temps = Vec::new();
    for_each_file(directory, |path, _| {
        if is_temp_file(&path) {
            temps.push(path);
        }
    })?;
    Ok(temps)
}

/// Size, count and age range of a namespace.
pub(crate) fn statistics(directory: &Path) -> Result<DiskStatistics, CacheError> {
    let mut stats = DiskStatistics::default();
    for entry in collect_entries(directory)? {
        stats.observe(entry.size, entry.modified);
    }
    Ok(stats)
}

/// Delete every file in a namespace directory, then the directory itself.
///
/// Each file is removed independently; the first failure is reported after
/// every other file has been attempted.
pub(crate) fn clear_namespace(directory: &Path) -> Result<ClearResult, CacheError> {
    let mut files = Vec::new();
    for_each_file(directory, |path, metadata| files.push((path, metadata.len())))?;

    let mut result = ClearResult::default();
    let mut first_error = None;

    for (path, size) in files {
        match remove_entry(&path) {
            Ok(true) => {
                result.files_deleted += 1;
                result.bytes_freed += size;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Failed to delete cache file while clearing");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    // Fails harmlessly if something else was created meanwhile
    let _ = fs::remove_dir(directory);
    Ok(result)
}

fn for_each_file(
    directory: &Path,
    mut visit: impl FnMut(PathBuf, fs::Metadata),
) -> Result<(), CacheError> {
    let read_dir = match fs::read_dir(directory) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(CacheError::io(directory, e)),
    };

    for entry in read_dir.flatten() {
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };
        if metadata.is_file() {
            visit(entry.path(), metadata);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::KeyCodec;
    use crate::cache::types::{CacheKey, Namespace};
    use tempfile::TempDir;

    fn storage(dir: &TempDir, ns: &str, key: &str) -> StoragePath {
        KeyCodec::new(dir.path()).path_for(
            &Namespace::new(ns).unwrap(),
            &CacheKey::new(key).unwrap(),
        )
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = storage(&dir, "default", "k1");

        write_entry(&path, &[1, 2, 3]).unwrap();

        assert_eq!(read_entry(&path).unwrap(), Some(vec![1, 2, 3]));
        assert!(!path.temp_path().exists(), "Temp file should be renamed away");
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = storage(&dir, "default", "k1");

        write_entry(&path, &[1, 2, 3]).unwrap();
        write_entry(&path, &[9]).unwrap();

        assert_eq!(read_entry(&path).unwrap(), Some(vec![9]));
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = storage(&dir, "default", "absent");
        assert_eq!(read_entry(&path).unwrap(), None);
    }

    #[test]
    fn test_remove_entry_reports_presence() {
        let dir = TempDir::new().unwrap();
        let path = storage(&dir, "default", "k1");
        write_entry(&path, &[1]).unwrap();

        assert!(remove_entry(path.path()).unwrap());
        assert!(!remove_entry(path.path()).unwrap());
    }

    #[test]
    fn test_move_entry() {
        let dir = TempDir::new().unwrap();
        let from = storage(&dir, "default", "old");
        let to = storage(&dir, "default", "new");
        write_entry(&from, &[5, 6]).unwrap();

        assert!(move_entry(&from, &to).unwrap());
        assert_eq!(read_entry(&from).unwrap(), None);
        assert_eq!(read_entry(&to).unwrap(), Some(vec![5, 6]));

        assert!(!move_entry(&from, &to).unwrap());
    }

    #[test]
    fn test_statistics_ignores_temp_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let a = storage(&dir, "default", "a");
        let b = storage(&dir, "default", "b");
        write_entry(&a, &[0u8; 100]).unwrap();
        write_entry(&b, &[0u8; 50]).unwrap();
        fs::write(a.temp_path(), [0u8; 999]).unwrap();
        fs::write(a.directory().join("notes.txt"), "hello").unwrap();

        let stats = statistics(a.directory()).unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_size, 150);
        assert!(stats.oldest_modified.is_some());
    }

    #[test]
    fn test_statistics_of_missing_namespace_is_empty() {
        let dir = TempDir::new().unwrap();
        let stats = statistics(&dir.path().join("nope")).unwrap();
        assert_eq!(stats, DiskStatistics::default());
    }

    #[test]
    fn test_clear_namespace_removes_everything() {
        let dir = TempDir::new().unwrap();
        let a = storage(&dir, "default", "a");
        write_entry(&a, &[0u8; 10]).unwrap();
        write_entry(&storage(&dir, "default", "b"), &[0u8; 20]).unwrap();
        fs::write(a.temp_path(), [0u8; 5]).unwrap();

        let result = clear_namespace(a.directory()).unwrap();
        assert_eq!(result.files_deleted, 3);
        assert_eq!(result.bytes_freed, 35);
        assert!(!a.directory().exists());
    }

    #[test]
    fn test_clear_missing_namespace_is_noop() {
        let dir = TempDir::new().unwrap();
        let result = clear_namespace(&dir.path().join("nope")).unwrap();
        assert_eq!(result, ClearResult::default());
    }

    #[test]
    fn test_clear_leaves_other_namespaces() {
        let dir = TempDir::new().unwrap();
        let a = storage(&dir, "first", "k");
        let b = storage(&dir, "second", "k");
        write_entry(&a, &[1]).unwrap();
        write_entry(&b, &[2]).unwrap();

        clear_namespace(a.directory()).unwrap();
        assert_eq!(read_entry(&b).unwrap(), Some(vec![2]));
    }
}
