//! CSV output formatting.
//!
//! One row per probe, in report order.

use crate::engine::ReachabilityReport;
use std::io::{self, Write};

/// Write the report's probe records as CSV.
pub fn write_csv<W: Write>(out: W, report: &ReachabilityReport) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["port", "protocol", "reachable", "inferred", "error", "latency_ms"])?;

    for result in &report.results {
        wtr.write_record([
            result.port.to_string(),
            result.protocol.to_string(),
            result.reachable.to_string(),
            result.inferred.to_string(),
            result.error.as_ref().map_or(String::new(), |e| e.to_string()),
            result.latency_ms.map_or(String::new(), |t| t.to_string()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
