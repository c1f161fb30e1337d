//! Namespace migration.
//!
//! Moves every entry from one namespace directory into another. File names
//! are derived from the key alone, so a moved file is found under the new
//! namespace without renaming. Files are moved one at a time with `rename()`,
//! falling back to copy and delete when the directories live on different
//! filesystems. An entry already present in the target is replaced.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use super::ops;
use crate::cache::key::{is_entry_file, is_temp_file};
use crate::cache::types::CacheError;

/// Result of migrating entries between namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateResult {
    /// Number of entries moved into the target namespace.
    pub files_moved: u64,
    /// Number of files left behind because they are not cache entries.
    pub files_skipped: u64,
    /// Total bytes migrated.
    pub bytes_migrated: u64,
}

/// Move every entry from `from_dir` into `to_dir`.
///
/// A missing source directory means there is nothing to migrate. A failure to
/// move one file does not stop the others; the first failure is reported as
/// [`CacheError::MigrationIncomplete`] once every file has been attempted.
/// The source directory is removed when it ends up empty.
pub(crate) fn migrate(from_dir: &Path, to_dir: &Path) -> Result<MigrateResult, CacheError> {
    let mut result = MigrateResult::default();

    if from_dir == to_dir {
        return Ok(result);
    }

    let read_dir = match fs::read_dir(from_dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(result),
        Err(e) => return Err(CacheError::io(from_dir, e)),
    };

    fs::create_dir_all(to_dir).map_err(|e| CacheError::io(to_dir, e))?;

    let mut failed = 0;
    let mut first_error = None;

    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // Leftovers of an interrupted write are never worth carrying over
        if is_temp_file(&path) {
            let _ = ops::remove_entry(&path);
            continue;
        }

        if !is_entry_file(&path) {
            result.files_skipped += 1;
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let dest = to_dir.join(entry.file_name());

        match ops::move_file(&path, &dest) {
            Ok(()) => {
                result.files_moved += 1;
                result.bytes_migrated += size;
            }
            // Vanished since listing; nothing left to move
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    from = %path.display(),
                    to = %dest.display(),
                    error = %e,
                    "Failed to migrate cache file"
                );
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(source) = first_error {
        return Err(CacheError::MigrationIncomplete {
            moved: result.files_moved,
            failed,
            source,
        });
    }

    // Only succeeds if nothing foreign was left behind
    let _ = fs::remove_dir(from_dir);

    info!(
        from = %from_dir.display(),
        to = %to_dir.display(),
        files_moved = result.files_moved,
        bytes_migrated = result.bytes_migrated,
        "Namespace migration complete"
    );

    Ok(result)
}
