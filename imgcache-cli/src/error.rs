//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use imgcache::cache::CacheError;
use imgcache::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Configuration file could not be loaded or is invalid
    Config(ConfigFileError),
    /// A cache operation failed
    Cache(CacheError),
    /// Key not present in either tier
    NotFound(String),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Failed to write an output file
    FileWrite { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Cache(CacheError::MigrationIncomplete { .. }) = self {
            eprintln!();
            eprintln!("Files that were moved stay in the target namespace.");
            eprintln!("Re-run the migration to retry the remaining files.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::NotFound(key) => write!(f, "No cached entry for '{}'", key),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) | CliError::Runtime(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::FileRead { error, .. } | CliError::FileWrite { error, .. } => Some(error),
            CliError::NotFound(_) => None,
        }
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}
