//! Configuration CLI commands.
//!
//! Provides `config show`, `config defaults` and `config check` for
//! inspecting loader settings stored in INI files.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use seriescache::LoaderConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective loader configuration as INI
    Show,

    /// Print the built-in defaults as INI
    Defaults,

    /// Validate an INI file without running anything
    Check {
        /// Path to the INI file
        path: PathBuf,
    },
}

/// Load the loader configuration, falling back to defaults without a file.
pub fn load(path: Option<&Path>) -> Result<LoaderConfig, CliError> {
    match path {
        Some(path) => LoaderConfig::from_ini_file(path)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e))),
        None => Ok(LoaderConfig::default()),
    }
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = load(config_path)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Defaults => {
            print!("{}", LoaderConfig::default().to_ini_string());
            Ok(())
        }
        ConfigCommands::Check { path } => {
            let config = load(Some(&path))?;
            println!("{} is valid", path.display());
            println!(
                "  zones: buffer {} / load {} / cache {}",
                config.buffer_zone_factor, config.load_zone_factor, config.cache_zone_factor
            );
            println!("  chunk policy: {}", config.chunk_policy);
            Ok(())
        }
    }
}
