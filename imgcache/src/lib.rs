//! imgcache - two-tier image cache
//!
//! A bounded in-memory LRU of decoded images backed by a persistent,
//! namespaced directory of encoded bytes, with background disk I/O, age and
//! size based cleanup, and namespace migration.
//!
//! ```no_run
//! use imgcache::cache::{BytesCodec, CacheConfig, ImageCache};
//!
//! # fn main() -> Result<(), imgcache::cache::CacheError> {
//! let cache = ImageCache::new(CacheConfig::default(), BytesCodec)?;
//!
//! cache.store_image("https://example.com/a.png", b"...".to_vec()).wait()?;
//! let lookup = cache.query("https://example.com/a.png").wait()?;
//! assert!(lookup.is_hit());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod logging;

/// Version of the imgcache library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
