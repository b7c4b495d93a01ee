//! JSON output formatting.

use crate::scanner::ScanResult;
use std::io;

/// Format a result as a single-line JSON object.
pub fn json_line(result: &ScanResult) -> io::Result<String> {
    serde_json::to_string(result).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
