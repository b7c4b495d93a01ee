//! Result sink and output formatting.
//!
//! The [`ResultSink`] drains the result stream, writing one line per open
//! port as results arrive. A results file, when configured, always receives
//! the plain `host:port` form so it can be fed to the cleanup pass.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::csv_line;
pub use json_format::json_line;
pub use plain::{
    plain_line, print_error, print_info, print_scan_header, print_summary, print_warning,
};

use crate::cli::OutputFormat;
use crate::scanner::ScanResult;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

/// Format a result according to the specified format.
pub fn format_result(result: &ScanResult, format: OutputFormat) -> io::Result<String> {
    match format {
        OutputFormat::Plain => Ok(plain_line(result)),
        OutputFormat::Json => json_line(result),
        OutputFormat::Csv => csv_line(result),
    }
}

/// Writes streamed results to a primary writer and an optional results file.
pub struct ResultSink<W: Write> {
    out: W,
    format: OutputFormat,
    file: Option<BufWriter<File>>,
}

impl<W: Write> ResultSink<W> {
    /// Create a sink writing `format` lines to `out`.
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            file: None,
        }
    }

    /// Also append plain lines to `path`, creating it if needed.
    pub fn with_file(mut self, path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "appending results to file");
        self.file = Some(BufWriter::new(file));
        Ok(self)
    }

    /// Write a single result.
    pub fn write(&mut self, result: &ScanResult) -> io::Result<()> {
        let line = format_result(result, self.format)?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;

        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", plain_line(result))?;
        }
        Ok(())
    }

    /// Drain `results` until every sender is gone. Returns the number of lines written.
    pub async fn consume(
        &mut self,
        mut results: mpsc::UnboundedReceiver<ScanResult>,
    ) -> io::Result<usize> {
        let mut written = 0;
        while let Some(result) = results.recv().await {
            self.write(&result)?;
            written += 1;
        }
        self.finish()?;
        Ok(written)
    }

    /// Flush buffered file output.
    pub fn finish(&mut self) -> io::Result<()> {
        self.out.flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
