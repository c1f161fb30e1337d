//! Configuration file commands.

use std::path::Path;

use imgcache::config::ConfigFile;

use crate::error::CliError;

/// Write a default configuration file to `path`.
///
/// An existing file is left alone unless `force` is set.
pub fn init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if ConfigFile::ensure_exists(path)? {
        println!("Created configuration file {}", path.display());
    } else {
        println!(
            "Configuration file {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_keeps_existing_file_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[cache]\nnamespace = mine\n").unwrap();

        init(&path, false).unwrap();
        assert_eq!(
            ConfigFile::load_from(&path).unwrap().cache.namespace,
            "mine"
        );

        init(&path, true).unwrap();
        assert_eq!(
            ConfigFile::load_from(&path).unwrap(),
            ConfigFile::default()
        );
    }
}
