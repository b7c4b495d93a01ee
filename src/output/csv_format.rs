//! CSV output formatting.

use crate::scanner::ScanResult;
use std::io;

/// Format a result as one `host,port` CSV record, quoting as needed.
pub fn csv_line(result: &ScanResult) -> io::Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let port = result.port.to_string();
    wtr.write_record([result.display_name.as_str(), port.as_str()])?;

    let bytes = wtr
        .into_inner()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let line =
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(line.trim_end_matches('\n').to_string())
}
