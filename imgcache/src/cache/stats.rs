//! Cache statistics tracking and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::config::format_bytes;

/// Shared counters updated by both tiers.
///
/// Counters only ever increase; size and entry figures for the memory tier
/// are sampled when a snapshot is taken.
#[derive(Debug)]
pub struct StatsRecorder {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    memory_evictions: AtomicU64,
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    disk_read_failures: AtomicU64,
    disk_writes: AtomicU64,
    disk_write_failures: AtomicU64,
    writes_coalesced: AtomicU64,
    disk_removals: AtomicU64,
    expired_removed: AtomicU64,
    trimmed_removed: AtomicU64,
    codec_failures: AtomicU64,
    created_at: Instant,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            memory_hits: AtomicU64::new(0),
            memory_misses: AtomicU64::new(0),
            memory_evictions: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            disk_misses: AtomicU64::new(0),
            disk_read_failures: AtomicU64::new(0),
            disk_writes: AtomicU64::new(0),
            disk_write_failures: AtomicU64::new(0),
            writes_coalesced: AtomicU64::new(0),
            disk_removals: AtomicU64::new(0),
            expired_removed: AtomicU64::new(0),
            trimmed_removed: AtomicU64::new(0),
            codec_failures: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    counter!(record_memory_hit, memory_hits);
    counter!(record_memory_miss, memory_misses);
    counter!(record_disk_hit, disk_hits);
    counter!(record_disk_miss, disk_misses);
    counter!(record_disk_read_failure, disk_read_failures);
    counter!(record_disk_write, disk_writes);
    counter!(record_disk_write_failure, disk_write_failures);
    counter!(record_write_coalesced, writes_coalesced);
    counter!(record_disk_removal, disk_removals);
    counter!(record_codec_failure, codec_failures);

    /// Record entries dropped from the memory tier by budget or pressure.
    pub fn record_memory_evictions(&self, count: u64) {
        self.memory_evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record files deleted by a cleanup sweep.
    pub fn record_cleanup(&self, expired: u64, trimmed: u64) {
        self.expired_removed.fetch_add(expired, Ordering::Relaxed);
        self.trimmed_removed.fetch_add(trimmed, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self, memory_size_bytes: usize, memory_entry_count: usize) -> CacheStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            memory_hits: load(&self.memory_hits),
            memory_misses: load(&self.memory_misses),
            memory_evictions: load(&self.memory_evictions),
            memory_size_bytes,
            memory_entry_count,
            disk_hits: load(&self.disk_hits),
            disk_misses: load(&self.disk_misses),
            disk_read_failures: load(&self.disk_read_failures),
            disk_writes: load(&self.disk_writes),
            disk_write_failures: load(&self.disk_write_failures),
            writes_coalesced: load(&self.writes_coalesced),
            disk_removals: load(&self.disk_removals),
            expired_removed: load(&self.expired_removed),
            trimmed_removed: load(&self.trimmed_removed),
            codec_failures: load(&self.codec_failures),
            uptime: self.created_at.elapsed(),
        }
    }
}

/// Plain copy of the counters at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    // Memory tier
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_evictions: u64,
    pub memory_size_bytes: usize,
    pub memory_entry_count: usize,

    // Disk tier
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_read_failures: u64,
    pub disk_writes: u64,
    pub disk_write_failures: u64,
    pub writes_coalesced: u64,
    pub disk_removals: u64,
    pub expired_removed: u64,
    pub trimmed_removed: u64,

    pub codec_failures: u64,
    pub uptime: Duration,
}

impl CacheStats {
    /// Memory tier hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Disk tier hit rate among queries that missed memory (0.0 to 1.0).
    pub fn disk_hit_rate(&self) -> f64 {
        ratio(self.disk_hits, self.disk_hits + self.disk_misses)
    }

    /// Hit rate across both tiers (0.0 to 1.0).
    ///
    /// Every query either hits memory, hits disk, or misses disk.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        ratio(hits, hits + self.disk_misses)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Result of walking a namespace directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStatistics {
    /// Sum of entry file sizes in bytes.
    pub total_size: u64,
    /// Number of committed entries.
    pub file_count: u64,
    /// Modification time of the oldest entry.
    pub oldest_modified: Option<SystemTime>,
    /// Modification time of the newest entry.
    pub newest_modified: Option<SystemTime>,
}

impl DiskStatistics {
    /// Age of the oldest entry relative to `now`.
    pub fn oldest_age(&self, now: SystemTime) -> Option<Duration> {
        self.oldest_modified
            .and_then(|oldest| now.duration_since(oldest).ok())
    }

    pub(crate) fn observe(&mut self, size: u64, modified: SystemTime) {
        self.total_size += size;
        self.file_count += 1;
        self.oldest_modified = Some(match self.oldest_modified {
            Some(oldest) => oldest.min(modified),
            None => modified,
        });
        self.newest_modified = Some(match self.newest_modified {
            Some(newest) => newest.max(modified),
            None => modified,
        });
    }
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub disk_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
}

impl CacheStatistics {
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            disk_hit_rate_percent: stats.disk_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
        }
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self, namespace: &str) -> String {
        let stats = &self.stats;

        format!(
            r#"Image Cache Statistics
Namespace: {}

MEMORY
  Entries:     {}
  Size:        {}
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}

DISK
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Coalesced:   {}
  Failures:    {}
  Expired:     {}
  Trimmed:     {}

OVERALL
  Hit Rate:    {:.1}%
  Uptime:      {}s
"#,
            namespace,
            stats.memory_entry_count,
            format_bytes(stats.memory_size_bytes as u64),
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.memory_evictions,
            stats.disk_hits,
            stats.disk_misses,
            self.disk_hit_rate_percent,
            stats.disk_writes,
            stats.writes_coalesced,
            stats.disk_write_failures + stats.disk_read_failures,
            stats.expired_removed,
            stats.trimmed_removed,
            self.overall_hit_rate_percent,
            stats.uptime.as_secs(),
        )
    }
}
