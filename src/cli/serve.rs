//! Serve subcommand implementation.
//!
//! Runs a reflector so that `netreach test` on another host has something
//! to talk to. Stops on Ctrl-C.

use crate::cli::Cli;
use crate::error::CliResult;
use crate::output;
use crate::reflector::Reflector;
use crate::types::PortList;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run a reflector that answers reachability probes.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, value_name = "IP", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Ports to answer on over both TCP and UDP. Defaults to the configured ports.
    #[arg(short, long)]
    pub ports: Option<String>,
}

impl ServeCommand {
    /// Execute the serve command.
    pub async fn execute(&self, cli: &Cli) -> CliResult<()> {
        let ports = match &self.ports {
            Some(ports) => ports.parse::<PortList>()?,
            None => PortList::from_raw(cli.settings()?.default_ports)?,
        };

        let reflector = Reflector::bind(self.bind, &ports).await?;
        if !cli.quiet {
            output::print_info(&format!(
                "Reflecting TCP and UDP on {} port(s) {}. Press Ctrl-C to stop.",
                self.bind, ports
            ));
        }

        let cancel = CancellationToken::new();
        let server = tokio::spawn(reflector.run(cancel.clone()));

        tokio::signal::ctrl_c().await?;
        info!("shutdown requested");
        cancel.cancel();
        server
            .await
            .map_err(|e| crate::error::CliError::Other(format!("reflector task failed: {e}")))?;

        Ok(())
    }
}
