//! imgcache CLI - inspect and maintain image cache directories.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use imgcache::config::{config_file_path, ConfigFile};
use imgcache::logging::init_logging;
use tracing::debug;

use commands::cache::CacheAction;
use error::CliError;

#[derive(Parser)]
#[command(name = "imgcache")]
#[command(version = imgcache::VERSION)]
#[command(about = "Inspect and maintain imgcache disk caches", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.imgcache/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Namespace to operate on, overriding the configuration file
    #[arg(long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Cache(CacheAction),

    /// Write a configuration file with default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    let action = match cli.command {
        Commands::InitConfig { force } => return commands::config::init(&config_path, force),
        Commands::Cache(action) => action,
    };

    let mut file = ConfigFile::load_from(&config_path)?;
    if let Some(namespace) = cli.namespace {
        file.cache.namespace = namespace;
    }

    let _logging = init_logging(&file.logging.directory, &file.logging.file)
        .map_err(CliError::LoggingInit)?;
    debug!(config = %config_path.display(), "Loaded configuration");

    commands::cache::run(action, file.to_cache_config()?)
}
