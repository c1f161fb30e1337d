//! INI serialization: `ConfigFile` → commented INI text.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Render a `ConfigFile` as the commented INI written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let disk_size = config
        .cache
        .disk_size
        .map(format_size)
        .unwrap_or_else(|| "none".to_string());

    format!(
        r#"[cache]
; Root directory; each namespace gets its own subdirectory
directory = {}
; Active namespace (a single directory name)
namespace = {}
; Memory budget for decoded images (supports KB, MB, GB suffixes)
memory_size = {}
; Disk size ceiling applied by cleanup, or "none" for age-only cleanup
disk_size = {}
; Entries older than this many days are removed by cleanup
max_age_days = {}
; Number of disk I/O worker threads
io_workers = {}

[logging]
; Directory for log files
directory = {}
; Log file name (truncated at startup)
file = {}
"#,
        path_to_string(&config.cache.directory),
        config.cache.namespace,
        format_size(config.cache.memory_size),
        disk_size,
        config.cache.max_age_days,
        config.cache.io_workers,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Abbreviate paths below the home directory with `~/`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_ini;
    use ini::Ini;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.cache.directory = "/srv/images".into();
        config.cache.namespace = "avatars".to_string();
        config.cache.memory_size = 64 * 1024 * 1024;
        config.cache.disk_size = Some(1024 * 1024 * 1024);
        config.cache.max_age_days = 3;
        config.cache.io_workers = 2;

        let text = to_config_string(&config);
        let parsed = parse_ini(&Ini::load_from_str(&text).unwrap()).unwrap();

        assert_eq!(parsed.cache, config.cache);
    }

    #[test]
    fn test_no_ceiling_written_as_none() {
        let text = to_config_string(&ConfigFile::default());
        assert!(text.contains("disk_size = none"));
        assert!(text.contains("memory_size = 256MB"));
        assert!(text.contains("max_age_days = 7"));
    }
}
