//! End-to-end behaviour of the two-tier cache against a real directory.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use imgcache::cache::{
    BytesCodec, CacheConfig, CacheError, CacheKey, CacheType, ImageCache, KeyCodec, Namespace,
};
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn config(dir: &TempDir) -> CacheConfig {
    CacheConfig::default().with_directory(dir.path())
}

fn open(config: CacheConfig) -> ImageCache<BytesCodec> {
    ImageCache::new(config, BytesCodec).unwrap()
}

fn entry_path(dir: &TempDir, namespace: &str, key: &str) -> std::path::PathBuf {
    KeyCodec::new(dir.path())
        .path_for(
            &Namespace::new(namespace).unwrap(),
            &CacheKey::new(key).unwrap(),
        )
        .path()
        .to_path_buf()
}

fn set_age(dir: &TempDir, key: &str, age: Duration) {
    File::options()
        .write(true)
        .open(entry_path(dir, "default", key))
        .unwrap()
        .set_modified(SystemTime::now() - age)
        .unwrap();
}

#[test]
fn round_trip_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let cache = open(config(&dir));
        cache
            .store_image("https://example.com/a.png", b"image-a".to_vec())
            .wait()
            .unwrap();
    }

    let cache = open(config(&dir));
    let lookup = cache.query("https://example.com/a.png").wait().unwrap();

    assert_eq!(lookup.cache_type, CacheType::Disk);
    assert_eq!(lookup.image.as_deref(), Some(&b"image-a".to_vec()));
}

#[test]
fn memory_only_store_never_reaches_disk() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir));

    cache.store("k", b"x".to_vec(), None, false).wait().unwrap();

    assert_eq!(cache.count_on_disk().wait().unwrap(), 0);
    cache.clear_memory();
    assert!(!cache.query("k").wait().unwrap().is_hit());
}

#[test]
fn removal_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir));
    cache.store_image("k", b"x".to_vec()).wait().unwrap();

    assert!(cache.remove("k", true).wait().unwrap());
    assert!(!cache.remove("k", true).wait().unwrap());
    assert!(!cache.remove("never-stored", true).wait().unwrap());
    assert!(!cache.query("k").wait().unwrap().is_hit());
}

#[test]
fn memory_budget_evicts_least_recently_used() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir).with_memory_size(2500));

    let _ = cache.store("a", vec![0u8; 1000], None, false);
    let _ = cache.store("b", vec![0u8; 1000], None, false);
    cache.lookup_memory_only("a");
    let _ = cache.store("c", vec![0u8; 1000], None, false);

    assert!(cache.lookup_memory_only("a").is_some());
    assert!(cache.lookup_memory_only("b").is_none());
    assert!(cache.lookup_memory_only("c").is_some());
}

#[test]
fn age_based_cleanup() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir).with_max_age(7 * DAY));
    for key in ["t1", "t2", "t3"] {
        cache.store_image(key, vec![0u8; 10]).wait().unwrap();
    }
    set_age(&dir, "t1", 20 * DAY);
    set_age(&dir, "t2", 10 * DAY);
    set_age(&dir, "t3", DAY);

    let report = cache.clean_disk().wait().unwrap();

    assert_eq!(report.expired_removed, 2);
    assert!(!entry_path(&dir, "default", "t1").exists());
    assert!(!entry_path(&dir, "default", "t2").exists());
    assert!(entry_path(&dir, "default", "t3").exists());
}

#[test]
fn size_based_cleanup_trims_oldest_first() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir).with_max_disk_size(250));
    for (key, days) in [("a", 4), ("b", 3), ("c", 2), ("d", 1)] {
        cache.store_image(key, vec![0u8; 100]).wait().unwrap();
        set_age(&dir, key, days * DAY);
    }

    let report = cache.clean_disk().wait().unwrap();

    assert_eq!(report.trimmed_removed, 2);
    assert!(report.remaining_bytes <= 250);
    assert!(!entry_path(&dir, "default", "a").exists());
    assert!(!entry_path(&dir, "default", "b").exists());
    assert!(entry_path(&dir, "default", "c").exists());
    assert!(entry_path(&dir, "default", "d").exists());
    assert_eq!(cache.size_on_disk().wait().unwrap(), 200);
}

#[test]
fn namespace_migration_moves_every_entry() {
    let dir = TempDir::new().unwrap();
    let old = Namespace::new("old").unwrap();
    let new = Namespace::new("new").unwrap();
    let cache = open(CacheConfig::new(old.clone()).with_directory(dir.path()));
    for key in ["a", "b", "c"] {
        cache.store_image(key, key.as_bytes().to_vec()).wait().unwrap();
    }

    let result = cache.move_entries(&old, Some(&new)).wait().unwrap();
    assert_eq!(result.files_moved, 3);
    assert!(!dir.path().join("old").exists());

    cache.set_namespace(new);
    for key in ["a", "b", "c"] {
        let lookup = cache.query(key).wait().unwrap();
        assert_eq!(lookup.cache_type, CacheType::Disk);
        assert_eq!(lookup.image.as_deref(), Some(&key.as_bytes().to_vec()));
    }
}

#[test]
fn migration_from_nonexistent_namespace_succeeds() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir));

    let result = cache
        .move_entries(&Namespace::new("ghost").unwrap(), None)
        .wait()
        .unwrap();

    assert_eq!(result.files_moved, 0);
}

#[test]
fn paths_are_deterministic_across_instances() {
    let dir = TempDir::new().unwrap();
    let ns = Namespace::new("default").unwrap();
    let key = CacheKey::new("https://example.com/../../etc/passwd").unwrap();

    let first = KeyCodec::new(dir.path()).path_for(&ns, &key);
    let second = KeyCodec::new(dir.path()).path_for(&ns, &key);

    assert_eq!(first, second);
    assert!(first.path().starts_with(dir.path().join("default")));
    assert_eq!(first.file_name().len(), 64 + ".cache".len());
}

#[test]
fn same_key_reads_observe_latest_write() {
    let dir = TempDir::new().unwrap();
    // A zero budget keeps nothing in memory, so every query reads the disk
    let cache = open(config(&dir).with_io_workers(4).with_memory_size(0));
    let disk_reads: Vec<_> = (0..50u8)
        .map(|n| {
            let _ = cache.store_image("k", vec![n]);
            (n, cache.query("k"))
        })
        .collect();

    for (n, query) in disk_reads {
        let lookup = query.wait().unwrap();
        assert_eq!(lookup.image.as_deref(), Some(&vec![n]));
    }
}

#[test]
fn concurrent_writers_on_distinct_keys() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open(config(&dir).with_io_workers(3)));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for n in 0..25 {
                    cache
                        .store_image(&format!("t{t}-{n}"), vec![t as u8; 8])
                        .wait()
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.count_on_disk().wait().unwrap(), 100);
    assert_eq!(cache.size_on_disk().wait().unwrap(), 800);
}

#[test]
fn shutdown_drains_then_rejects() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir));

    let pending = cache.store_image("k", b"x".to_vec());
    cache.shutdown();

    pending.wait().unwrap();
    assert!(entry_path(&dir, "default", "k").exists());
    assert!(matches!(
        cache.store_image("other", b"y".to_vec()).wait(),
        Err(CacheError::WorkerUnavailable)
    ));
    assert!(cache.lookup_memory_only("other").is_some());
}

#[tokio::test]
async fn completions_are_awaitable() {
    let dir = TempDir::new().unwrap();
    let cache = open(config(&dir));

    cache.store_image("k", b"async".to_vec()).await.unwrap();
    cache.clear_memory();
    let lookup = cache.query("k").await.unwrap();

    assert_eq!(lookup.image.as_deref(), Some(&b"async".to_vec()));
    let stats = cache.disk_statistics().await.unwrap();
    assert_eq!(stats.file_count, 1);
}
