//! Config subcommand implementation.
//!
//! Handles `netreach config show` and `netreach config init`.

use crate::cli::Cli;
use crate::config::{AppSettings, Paths};
use crate::error::{CliError, CliResult};
use crate::output;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Show or create the settings file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON
    Show,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command.
    pub fn execute(&self, cli: &Cli) -> CliResult<()> {
        match &self.action {
            ConfigAction::Show => {
                let settings = cli.settings()?;
                let json = serde_json::to_string_pretty(&settings)
                    .map_err(|e| CliError::Other(e.to_string()))?;
                println!("{json}");
                Ok(())
            }
            ConfigAction::Init { force } => {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Paths::new()?.settings_file(),
                };
                let written = init(path, *force)?;
                if !cli.quiet {
                    output::print_info(&format!("Settings written to {}", written.display()));
                }
                Ok(())
            }
        }
    }
}

/// Write default settings to `path` unless a file is already there.
fn init(path: PathBuf, force: bool) -> CliResult<PathBuf> {
    if path.exists() && !force {
        return Err(CliError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    AppSettings::default().save_to(&path)?;
    Ok(path)
}
