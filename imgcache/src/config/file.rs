//! Configuration file handling for `~/.imgcache/config.ini`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::{ConfigFile, SECONDS_PER_DAY};
use crate::cache::{CacheConfig, Namespace};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load from the default path; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load from a specific path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Write the defaults to `path` unless a file already exists there.
    ///
    /// Returns whether a new file was created.
    pub fn ensure_exists(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Build the cache configuration described by the `[cache]` section.
    pub fn to_cache_config(&self) -> Result<CacheConfig, ConfigFileError> {
        let settings = &self.cache;
        let invalid = |key: &str, value: String, reason: &str| ConfigFileError::InvalidValue {
            section: "cache".to_string(),
            key: key.to_string(),
            value,
            reason: reason.to_string(),
        };

        let namespace = Namespace::new(settings.namespace.as_str()).map_err(|_| {
            invalid(
                "namespace",
                settings.namespace.clone(),
                "must be a single directory name",
            )
        })?;
        let memory_size = usize::try_from(settings.memory_size).map_err(|_| {
            invalid(
                "memory_size",
                settings.memory_size.to_string(),
                "too large for this platform",
            )
        })?;

        let mut config = CacheConfig::new(namespace)
            .with_directory(&settings.directory)
            .with_memory_size(memory_size)
            .with_max_age(Duration::from_secs(
                settings.max_age_days.saturating_mul(SECONDS_PER_DAY),
            ))
            .with_io_workers(settings.io_workers);
        config.max_disk_size = settings.disk_size;
        Ok(config)
    }
}

/// Config directory (`~/.imgcache`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".imgcache")
}

/// Config file path (`~/.imgcache/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
