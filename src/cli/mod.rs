//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `netreach test [host]` - Run a reachability test
//! - `netreach serve` - Answer reachability probes from other hosts
//! - `netreach config show|init` - Inspect or create the settings file

mod config;
mod serve;

pub use config::{ConfigAction, ConfigCommand};
pub use serve::ServeCommand;
pub use test::TestCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// netreach - TCP and UDP port reachability testing.
///
/// Tests whether a host accepts TCP connections and answers UDP datagrams on
/// a list of ports, probing every port over both protocols concurrently.
#[derive(Parser, Debug)]
#[command(name = "netreach")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TCP and UDP port reachability tester", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test TCP and UDP reachability of a host
    #[command(alias = "t")]
    Test(TestCommand),

    /// Run a reflector that answers reachability probes
    #[command(alias = "s")]
    Serve(ServeCommand),

    /// Show or create the settings file
    #[command(alias = "c")]
    Config(ConfigCommand),
}

impl Cli {
    /// Dispatch to the selected subcommand.
    pub async fn execute(&self) -> CliResult<()> {
        match &self.command {
            Commands::Test(cmd) => cmd.execute(self).await,
            Commands::Serve(cmd) => cmd.execute(self).await,
            Commands::Config(cmd) => cmd.execute(self),
        }
    }

    /// Settings from `--config`, or the default location.
    pub fn settings(&self) -> CliResult<AppSettings> {
        Ok(load_settings(self.config.as_deref())?)
    }

    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn load_settings(path: Option<&Path>) -> crate::error::ConfigResult<AppSettings> {
    match path {
        Some(path) => AppSettings::load_from(path),
        None => AppSettings::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_filter_follows_verbosity() {
        let cli = Cli::parse_from(["netreach", "test"]);
        assert_eq!(cli.log_filter(), "warn");

        let cli = Cli::parse_from(["netreach", "-vv", "test"]);
        assert_eq!(cli.log_filter(), "debug");

        let cli = Cli::parse_from(["netreach", "test", "-vvvv"]);
        assert_eq!(cli.log_filter(), "trace");

        let cli = Cli::parse_from(["netreach", "--quiet", "serve", "-p", "80"]);
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn test_explicit_settings_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        AppSettings {
            default_host: "192.0.2.1".into(),
            ..AppSettings::default()
        }
        .save_to(&path)
        .unwrap();

        let cli = Cli::parse_from([
            "netreach",
            "--config",
            path.to_str().unwrap(),
            "test",
        ]);
        assert_eq!(cli.settings().unwrap().default_host, "192.0.2.1");
    }
}
