//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, MAX_IO_WORKERS};
use super::size::parse_size;
use crate::cache::Namespace;

const SIZE_HINT: &str = "expected format like '2GB', '500MB', or '1024KB'";

/// Parse an `Ini` into a `ConfigFile`, starting from the defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "namespace") {
            Namespace::new(v).map_err(|_| {
                invalid("cache", "namespace", v, "must be a single directory name")
            })?;
            config.cache.namespace = v.to_string();
        }
        if let Some(v) = non_empty(section, "memory_size") {
            config.cache.memory_size =
                parse_size(v).map_err(|_| invalid("cache", "memory_size", v, SIZE_HINT))?;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_size = parse_disk_size(v)?;
        }
        if let Some(v) = non_empty(section, "max_age_days") {
            config.cache.max_age_days = match v.parse::<u64>() {
                Ok(days) if days > 0 => days,
                _ => return Err(invalid("cache", "max_age_days", v, "must be a positive integer")),
            };
        }
        if let Some(v) = non_empty(section, "io_workers") {
            config.cache.io_workers = match v.parse::<usize>() {
                Ok(n) if (1..=MAX_IO_WORKERS).contains(&n) => n,
                _ => {
                    return Err(invalid(
                        "cache",
                        "io_workers",
                        v,
                        &format!("must be between 1 and {}", MAX_IO_WORKERS),
                    ))
                }
            };
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

/// Empty, `0` or `none` means no ceiling.
fn parse_disk_size(v: &str) -> Result<Option<u64>, ConfigFileError> {
    let trimmed = v.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match parse_size(trimmed) {
        Ok(0) => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(_) => Err(invalid("cache", "disk_size", v, SIZE_HINT)),
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_cache_section() {
        let config = parse(
            "[cache]\n\
             directory = /var/cache/images\n\
             namespace = thumbs\n\
             memory_size = 64MB\n\
             disk_size = 2GB\n\
             max_age_days = 30\n\
             io_workers = 4\n",
        )
        .unwrap();

        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/images"));
        assert_eq!(config.cache.namespace, "thumbs");
        assert_eq!(config.cache.memory_size, 64 * 1024 * 1024);
        assert_eq!(config.cache.disk_size, Some(2 * 1024 * 1024 * 1024));
        assert_eq!(config.cache.max_age_days, 30);
        assert_eq!(config.cache.io_workers, 4);
    }

    #[test]
    fn test_disk_size_none() {
        for value in ["", "0", "none", "NONE"] {
            let config = parse(&format!("[cache]\ndisk_size = {value}\n")).unwrap();
            assert_eq!(config.cache.disk_size, None, "value {value:?}");
        }
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            "[cache]\nmemory_size = lots\n",
            "[cache]\ndisk_size = 1.5GB\n",
            "[cache]\nnamespace = ../escape\n",
            "[cache]\nmax_age_days = 0\n",
            "[cache]\nio_workers = 0\n",
            "[cache]\nio_workers = 1000\n",
        ];
        for content in cases {
            assert!(
                matches!(parse(content), Err(ConfigFileError::InvalidValue { .. })),
                "should reject {content:?}"
            );
        }
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /tmp/logs\nfile = cache.log\n").unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/tmp/logs"));
        assert_eq!(config.logging.file, "cache.log");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/cache"), home.join("cache"));
        }
    }
}
