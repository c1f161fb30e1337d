//! Age and size based cleanup of a namespace directory.
//!
//! The sweep runs in two passes:
//!
//! 1. Every entry last modified before `now - max_age` is deleted.
//! 2. If a size ceiling is set and the survivors still exceed it, the oldest
//!    survivors are deleted until the namespace fits. Entries with identical
//!    modification times are ordered by file name so the result does not
//!    depend on directory iteration order.
//!
//! The second pass is skipped entirely when the first one already brought the
//! namespace under budget. Orphaned temp files left behind by an interrupted
//! write are removed as well; the sweep only runs while every worker is
//! fenced, so no temp file can belong to a live write.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::ops::{self, EntryFile};
use crate::cache::types::CacheError;

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries deleted because they were older than the maximum age.
    pub expired_removed: u64,
    /// Entries deleted to bring the namespace under the size ceiling.
    pub trimmed_removed: u64,
    /// Orphaned temp files deleted.
    pub temp_removed: u64,
    /// Bytes released by deleted entries.
    pub bytes_freed: u64,
    /// Total size of the entries left on disk.
    pub remaining_bytes: u64,
    /// Number of entries left on disk.
    pub remaining_files: u64,
}

/// Sweep a namespace directory.
pub(crate) fn cleanup(
    directory: &Path,
    max_age: Duration,
    max_size: Option<u64>,
    now: SystemTime,
) -> Result<CleanupReport, CacheError> {
    let mut report = CleanupReport::default();

    for temp in ops::collect_temp_files(directory)? {
        if delete(&temp) {
            report.temp_removed += 1;
        }
    }

    let cutoff = now.checked_sub(max_age);
    let mut survivors = Vec::new();

    for entry in ops::collect_entries(directory)? {
        let expired = cutoff.is_some_and(|cutoff| entry.modified < cutoff);
        if !expired {
            survivors.push(entry);
            continue;
        }
        if delete(&entry.path) {
            report.expired_removed += 1;
            report.bytes_freed += entry.size;
        }
    }

    let mut remaining_bytes: u64 = survivors.iter().map(|entry| entry.size).sum();
    let mut remaining_files = survivors.len() as u64;

    match max_size {
        Some(limit) if remaining_bytes > limit => {
            debug!(
                directory = %directory.display(),
                remaining_bytes,
                limit,
                "Namespace over size ceiling after expiry, trimming oldest entries"
            );
            sort_oldest_first(&mut survivors);

            for entry in &survivors {
                if remaining_bytes <= limit {
                    break;
                }
                if delete(&entry.path) {
                    report.trimmed_removed += 1;
                    report.bytes_freed += entry.size;
                }
                // A file that vanished on its own no longer counts either
                remaining_bytes = remaining_bytes.saturating_sub(entry.size);
                remaining_files -= 1;
            }
        }
        _ => {}
    }

    report.remaining_bytes = remaining_bytes;
    report.remaining_files = remaining_files;

    if report.expired_removed + report.trimmed_removed + report.temp_removed > 0 {
        info!(
            directory = %directory.display(),
            expired = report.expired_removed,
            trimmed = report.trimmed_removed,
            temp = report.temp_removed,
            bytes_freed = report.bytes_freed,
            remaining_bytes = report.remaining_bytes,
            "Disk cache cleanup complete"
        );
    }

    Ok(report)
}

/// Oldest modification time first, file name as tie-breaker.
fn sort_oldest_first(entries: &mut [EntryFile]) {
    entries.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
}

/// Delete one file, treating failures as "already gone".
fn delete(path: &Path) -> bool {
    match ops::remove_entry(path) {
        Ok(removed) => removed,
        Err(e) => {
            warn!(error = %e, "Failed to delete cache file during cleanup");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn entry(dir: &Path, name: &str, size: usize, modified: SystemTime) {
        let path = dir.join(format!("{name}.cache"));
        fs::write(&path, vec![0u8; size]).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    fn exists(dir: &Path, name: &str) -> bool {
        dir.join(format!("{name}.cache")).exists()
    }

    #[test]
    fn test_age_pass_removes_only_expired() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        entry(dir.path(), "t1", 10, now - 10 * DAY);
        entry(dir.path(), "t2", 10, now - 8 * DAY);
        entry(dir.path(), "t3", 10, now - DAY);

        let report = cleanup(dir.path(), 7 * DAY, None, now).unwrap();

        assert_eq!(report.expired_removed, 2);
        assert_eq!(report.trimmed_removed, 0);
        assert_eq!(report.bytes_freed, 20);
        assert_eq!(report.remaining_files, 1);
        assert!(!exists(dir.path(), "t1"));
        assert!(!exists(dir.path(), "t2"));
        assert!(exists(dir.path(), "t3"));
    }

    #[test]
    fn test_size_pass_trims_oldest_first() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        entry(dir.path(), "a", 100, now - 3 * DAY);
        entry(dir.path(), "b", 100, now - 2 * DAY);
        entry(dir.path(), "c", 100, now - DAY);

        let report = cleanup(dir.path(), 7 * DAY, Some(150), now).unwrap();

        assert_eq!(report.expired_removed, 0);
        assert_eq!(report.trimmed_removed, 2);
        assert_eq!(report.remaining_bytes, 100);
        assert!(!exists(dir.path(), "a"));
        assert!(!exists(dir.path(), "b"));
        assert!(exists(dir.path(), "c"));
    }

    #[test]
    fn test_size_pass_breaks_ties_by_name() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        let same = now - DAY;
        entry(dir.path(), "ccc", 100, same);
        entry(dir.path(), "aaa", 100, same);
        entry(dir.path(), "bbb", 100, same);

        cleanup(dir.path(), 7 * DAY, Some(200), now).unwrap();

        assert!(!exists(dir.path(), "aaa"));
        assert!(exists(dir.path(), "bbb"));
        assert!(exists(dir.path(), "ccc"));
    }

    #[test]
    fn test_size_pass_skipped_when_expiry_suffices() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        entry(dir.path(), "old", 500, now - 30 * DAY);
        entry(dir.path(), "new1", 100, now - DAY);
        entry(dir.path(), "new2", 100, now);

        let report = cleanup(dir.path(), 7 * DAY, Some(300), now).unwrap();

        assert_eq!(report.expired_removed, 1);
        assert_eq!(report.trimmed_removed, 0);
        assert!(exists(dir.path(), "new1"));
        assert!(exists(dir.path(), "new2"));
    }

    #[test]
    fn test_removes_orphaned_temp_files() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        fs::write(dir.path().join("abc.tmp"), [0u8; 64]).unwrap();
        entry(dir.path(), "keep", 10, now);

        let report = cleanup(dir.path(), 7 * DAY, None, now).unwrap();

        assert_eq!(report.temp_removed, 1);
        assert_eq!(report.remaining_files, 1);
        assert!(!dir.path().join("abc.tmp").exists());
    }

    #[test]
    fn test_foreign_files_are_left_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README"), "x").unwrap();

        let report = cleanup(dir.path(), Duration::ZERO, Some(0), SystemTime::now()).unwrap();

        assert_eq!(report, CleanupReport::default());
        assert!(dir.path().join("README").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let report = cleanup(
            &dir.path().join("missing"),
            7 * DAY,
            Some(0),
            SystemTime::now(),
        )
        .unwrap();
        assert_eq!(report, CleanupReport::default());
    }
}
