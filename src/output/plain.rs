//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::engine::ReachabilityReport;
use crate::probe::{ProbeResult, Protocol};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write a report in human-readable plain text format.
pub fn write_plain<W: Write>(mut out: W, report: &ReachabilityReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "               {} Reachability Results",
        style("netreach").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(out, "  {} {}", style("IP Address:").bold(), report.ip_address)?;
    writeln!(
        out,
        "  {} {}",
        style("Run ID:").bold(),
        style(report.run_id.short()).dim()
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "  {} {} ports tested in {:.2}s",
        style("Statistics:").bold(),
        report.ports.len(),
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} reachable over TCP, {} over UDP",
        style(report.reachable_count(Protocol::Tcp)).green().bold(),
        style(report.reachable_count(Protocol::Udp)).green().bold()
    )?;
    writeln!(out)?;

    if report.ports.is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:<22}  {}",
            style("PORT").bold(),
            style("TCP").bold(),
            style("UDP").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for &port in &report.ports {
            let tcp = report.get(port, Protocol::Tcp).map(describe).unwrap_or_default();
            let udp = report.get(port, Protocol::Udp).map(describe).unwrap_or_default();
            writeln!(out, "  {:>6}  {:<22}  {}", port, tcp, udp)?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// One table cell: verdict plus the reason or qualifier.
fn describe(result: &ProbeResult) -> String {
    let (text, cell_style) = match (&result.error, result.reachable, result.inferred) {
        (_, true, true) => ("open?".to_string(), Style::new().yellow()),
        (_, true, false) => ("reachable".to_string(), Style::new().green().bold()),
        (Some(error), false, _) => (format!("no ({})", error), Style::new().red()),
        (None, false, _) => ("no".to_string(), Style::new().red()),
    };
    cell_style.apply_to(text).to_string()
}

/// Print a header before the test begins.
pub fn print_test_header(target: &str, ip: &str, ports: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("netreach").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Target: {} ({})",
        style("•").dim(),
        style(target).white().bold(),
        ip
    );
    println!(
        "{} Testing {} ports over TCP and UDP...",
        style("•").dim(),
        style(ports).white().bold()
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}
