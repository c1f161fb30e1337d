//! Background services for a long-running cache.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use imgcache::cache::{run_cleanup_daemon, ImageCache};
//! use tokio_util::sync::CancellationToken;
//!
//! let cache = ImageCache::shared();
//! let cancellation = CancellationToken::new();
//! tokio::spawn(run_cleanup_daemon(cache, Duration::from_secs(3600), cancellation.clone()));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::codec::ImageCodec;
use crate::cache::coordinator::ImageCache;
use crate::cache::types::MemoryPressure;

/// Run disk cleanup at startup and then once per `interval`.
///
/// Returns when `cancellation` fires.
pub async fn run_cleanup_daemon<C: ImageCodec>(
    cache: Arc<ImageCache<C>>,
    interval: Duration,
    cancellation: CancellationToken,
) {
    info!(
        namespace = %cache.namespace(),
        interval_secs = interval.as_secs(),
        "Starting disk cache cleanup daemon"
    );

    clean_once(&cache).await;

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("Disk cache cleanup daemon shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                clean_once(&cache).await;
            }
        }
    }
}

async fn clean_once<C: ImageCodec>(cache: &ImageCache<C>) {
    match cache.clean_disk().await {
        Ok(report) => debug!(
            expired = report.expired_removed,
            trimmed = report.trimmed_removed,
            remaining_bytes = report.remaining_bytes,
            "Scheduled disk cleanup finished"
        ),
        Err(e) => warn!(error = %e, "Scheduled disk cleanup failed"),
    }
}

/// Forward memory-pressure notifications to the cache until cancelled or
/// every sender is dropped.
pub async fn run_memory_pressure_listener<C: ImageCodec>(
    cache: Arc<ImageCache<C>>,
    mut receiver: broadcast::Receiver<MemoryPressure>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            event = receiver.recv() => match event {
                Ok(level) => cache.on_memory_pressure(level),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed signals are folded into the harshest response
                    warn!(skipped, "Memory pressure listener lagged");
                    cache.on_memory_pressure(MemoryPressure::Critical);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("Memory pressure listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::BytesCodec;
    use crate::cache::config::CacheConfig;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> Arc<ImageCache<BytesCodec>> {
        let config = CacheConfig::default()
            .with_directory(dir.path())
            .with_max_age(Duration::from_secs(60));
        Arc::new(ImageCache::new(config, BytesCodec).unwrap())
    }

    #[tokio::test]
    async fn test_cleanup_daemon_runs_at_startup_and_stops() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.store_image("old", vec![0u8; 8]).await.unwrap();

        let path = dir
            .path()
            .join("default")
            .join(crate::cache::KeyCodec::key_to_filename(
                &crate::cache::CacheKey::new("old").unwrap(),
            ));
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();

        let cancellation = CancellationToken::new();
        let daemon = tokio::spawn(run_cleanup_daemon(
            Arc::clone(&cache),
            Duration::from_secs(3600),
            cancellation.clone(),
        ));

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!path.exists(), "Startup sweep should expire the old entry");

        cancellation.cancel();
        daemon.await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_pressure_listener_forwards_events() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let _ = cache.store("k", vec![1], None, false);

        let (sender, receiver) = broadcast::channel(4);
        let cancellation = CancellationToken::new();
        let listener = tokio::spawn(run_memory_pressure_listener(
            Arc::clone(&cache),
            receiver,
            cancellation.clone(),
        ));

        sender.send(MemoryPressure::Critical).unwrap();
        drop(sender);
        listener.await.unwrap();

        assert!(cache.lookup_memory_only("k").is_none());
    }
}
