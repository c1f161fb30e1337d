//! User configuration file and size helpers.
//!
//! The INI file at `~/.imgcache/config.ini` is turned into a
//! [`CacheConfig`](crate::cache::CacheConfig) with
//! [`ConfigFile::to_cache_config`]:
//!
//! ```
//! use imgcache::config::ConfigFile;
//!
//! let config = ConfigFile::default().to_cache_config().unwrap();
//! assert_eq!(config.namespace.as_str(), "default");
//! ```

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, ConfigFile, LoggingSettings, MAX_IO_WORKERS, SECONDS_PER_DAY};
pub use size::{format_bytes, format_size, parse_size, Size, SizeParseError};
