//! Cache maintenance and inspection commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::Subcommand;
use imgcache::cache::{run_cleanup_daemon, BytesCodec, CacheConfig, ImageCache, Namespace};
use imgcache::config::format_bytes;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show disk usage and age range of the active namespace
    Stats,
    /// Remove expired entries, then trim to the configured size ceiling
    Clean {
        /// Keep running and clean again every this many seconds
        #[arg(long, value_name = "SECONDS")]
        every: Option<u64>,
    },
    /// Delete every entry of the active namespace
    Clear,
    /// Move every entry from one namespace into another
    Migrate {
        /// Namespace to move entries out of
        from: String,
        /// Namespace to move entries into (default: "default")
        to: Option<String>,
    },
    /// Store a file under a key
    Put {
        key: String,
        file: PathBuf,
        /// Keep the entry in memory only (it is lost when the command exits)
        #[arg(long)]
        memory_only: bool,
    },
    /// Write the entry stored under a key to a file
    Get { key: String, output: PathBuf },
    /// Remove the entry stored under a key
    Remove { key: String },
}

/// Run a cache subcommand against the configured cache.
pub fn run(action: CacheAction, config: CacheConfig) -> Result<(), CliError> {
    let cache = ImageCache::new(config, BytesCodec)?;

    match action {
        CacheAction::Stats => stats(&cache),
        CacheAction::Clean { every: None } => clean(&cache),
        CacheAction::Clean {
            every: Some(seconds),
        } => clean_forever(cache, Duration::from_secs(seconds.max(1))),
        CacheAction::Clear => {
            let result = cache.clear_disk().wait()?;
            println!(
                "Deleted {} files, freed {}",
                result.files_deleted,
                format_bytes(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Migrate { from, to } => {
            let from = Namespace::new(from)?;
            let to = to.map(Namespace::new).transpose()?;
            let result = cache.move_entries(&from, to.as_ref()).wait()?;
            let to = to.unwrap_or_default();
            if result.files_moved == 0 {
                println!("Nothing to migrate from '{}'", from);
            } else {
                println!(
                    "Migrated {} files ({}) from '{}' to '{}'",
                    result.files_moved,
                    format_bytes(result.bytes_migrated),
                    from,
                    to
                );
            }
            if result.files_skipped > 0 {
                println!("Skipped {} non-cache files", result.files_skipped);
            }
            Ok(())
        }
        CacheAction::Put {
            key,
            file,
            memory_only,
        } => {
            let bytes = std::fs::read(&file).map_err(|error| CliError::FileRead {
                path: file.clone(),
                error,
            })?;
            let size = bytes.len() as u64;
            cache.store(&key, bytes, None, !memory_only).wait()?;
            if memory_only {
                println!("Stored '{}' ({}) in memory only", key, format_bytes(size));
            } else {
                println!("Stored '{}' ({})", key, format_bytes(size));
            }
            Ok(())
        }
        CacheAction::Get { key, output } => {
            let lookup = cache.query(&key).wait()?;
            let image = lookup.image.ok_or_else(|| CliError::NotFound(key.clone()))?;
            std::fs::write(&output, image.as_slice()).map_err(|error| CliError::FileWrite {
                path: output.clone(),
                error,
            })?;
            println!("Wrote {} to {}", format_bytes(image.len() as u64), output.display());
            Ok(())
        }
        CacheAction::Remove { key } => {
            if cache.remove(&key, true).wait()? {
                println!("Removed '{}'", key);
            } else {
                println!("'{}' was not cached", key);
            }
            Ok(())
        }
    }
}

fn stats(cache: &ImageCache<BytesCodec>) -> Result<(), CliError> {
    let disk = cache.disk_statistics().wait()?;

    println!("Disk cache: {}", cache.config().directory.display());
    println!("  Namespace: {}", cache.namespace());
    println!("  Files:     {}", disk.file_count);
    println!("  Size:      {}", format_bytes(disk.total_size));
    if let Some(limit) = cache.config().max_disk_size {
        println!("  Limit:     {}", format_bytes(limit));
    }
    if let Some(age) = disk.oldest_age(SystemTime::now()) {
        println!("  Oldest:    {}", format_age(age));
    }
    println!();
    print!("{}", cache.stats().format(cache.namespace().as_str()));
    Ok(())
}

fn clean(cache: &ImageCache<BytesCodec>) -> Result<(), CliError> {
    let report = cache.clean_disk().wait()?;
    println!(
        "Removed {} expired and {} over-budget files, freed {}",
        report.expired_removed,
        report.trimmed_removed,
        format_bytes(report.bytes_freed)
    );
    println!(
        "{} files ({}) remain",
        report.remaining_files,
        format_bytes(report.remaining_bytes)
    );
    Ok(())
}

fn clean_forever(cache: ImageCache<BytesCodec>, interval: Duration) -> Result<(), CliError> {
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let cache = Arc::new(cache);
    let cancellation = CancellationToken::new();

    runtime.block_on(async {
        let daemon = tokio::spawn(run_cleanup_daemon(
            Arc::clone(&cache),
            interval,
            cancellation.clone(),
        ));

        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupted, stopping cleanup");
        cancellation.cancel();
        let _ = daemon.await;
    });

    cache.shutdown();
    Ok(())
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        s if s >= 86_400 => format!("{} days", s / 86_400),
        s if s >= 3_600 => format!("{} hours", s / 3_600),
        s if s >= 60 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}
