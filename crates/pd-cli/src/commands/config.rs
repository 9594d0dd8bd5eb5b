//! Config command implementation

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use pd_core::config::{load_config, save_config, ClientConfig};
use pd_core::ConfigError;

use crate::output::print_success;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the active configuration
    Show,
}

/// Execute the config command
pub fn config_command(path: &Path, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            save_config(path, &ClientConfig::default())?;
            print_success(&format!("Wrote {}", path.display()));
            Ok(())
        }
        ConfigAction::Show => {
            let config: ClientConfig = match load_config(path) {
                Ok(config) => config,
                Err(ConfigError::NotFound(_)) => {
                    println!("# {} does not exist; showing defaults", path.display());
                    ClientConfig::default()
                }
                Err(e) => return Err(e).context("Failed to load configuration"),
            };
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
