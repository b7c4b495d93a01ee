//! Target input sources.
//!
//! Targets come from exactly one place, picked in this order: a single
//! target, a single CIDR block, a file (or stdin) of CIDR lines, a file of
//! host lines, and finally stdin host lines.

use crate::types::{TargetError, TargetSpec};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// Where targets are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// One IP address or hostname.
    Single(String),
    /// One CIDR block.
    Cidr(String),
    /// CIDR lines from a file, or from stdin when the file is absent or unreadable.
    CidrList(Option<PathBuf>),
    /// Host lines from a file.
    HostList(PathBuf),
    /// Host lines from stdin.
    Stdin,
}

impl TargetSource {
    /// Pick the source from the individual options, first match wins.
    pub fn select(
        target: Option<String>,
        cidr: Option<String>,
        cidr_list: Option<Option<PathBuf>>,
        list: Option<PathBuf>,
    ) -> Self {
        if let Some(target) = target.filter(|t| !t.trim().is_empty()) {
            Self::Single(target)
        } else if let Some(cidr) = cidr.filter(|c| !c.trim().is_empty()) {
            Self::Cidr(cidr)
        } else if let Some(path) = cidr_list {
            Self::CidrList(path)
        } else if let Some(path) = list {
            Self::HostList(path)
        } else {
            Self::Stdin
        }
    }

    /// Read and parse every target from this source.
    ///
    /// Unparsable entries are skipped. `stdin` is only touched for the
    /// sources that need it.
    pub fn load<R: BufRead>(&self, stdin: R) -> io::Result<Vec<TargetSpec>> {
        let specs = match self {
            Self::Single(target) => parse_each(std::iter::once(target.clone()), TargetSpec::parse),
            Self::Cidr(cidr) => parse_each(std::iter::once(cidr.clone()), TargetSpec::cidr),
            Self::CidrList(path) => {
                let file = path.as_ref().and_then(|p| match File::open(p) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        debug!(path = %p.display(), error = %e, "cannot open CIDR list, reading stdin");
                        None
                    }
                });
                let lines = match file {
                    Some(file) => read_lines(BufReader::new(file))?,
                    None => read_lines(stdin)?,
                };
                parse_each(lines, TargetSpec::cidr)
            }
            Self::HostList(path) => match File::open(path) {
                Ok(file) => parse_each(read_lines(BufReader::new(file))?, TargetSpec::parse),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "cannot open host list");
                    Vec::new()
                }
            },
            Self::Stdin => parse_each(read_lines(stdin)?, TargetSpec::parse),
        };
        Ok(specs)
    }
}

/// Read trimmed, non-empty lines. Lines that are not valid UTF-8 are skipped.
pub fn read_lines<R: BufRead>(mut reader: R) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
            Err(e) => debug!(error = %e, "skipping line that is not valid UTF-8"),
        }
    }
    Ok(lines)
}

fn parse_each<I, F>(lines: I, parse: F) -> Vec<TargetSpec>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Result<TargetSpec, TargetError>,
{
    lines
        .into_iter()
        .filter_map(|line| match parse(&line) {
            Ok(spec) => Some(spec),
            Err(e) => {
                debug!(line = %line, error = %e, "skipping target");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn empty_stdin() -> Cursor<&'static [u8]> {
        Cursor::new(&b""[..])
    }

    #[test]
    fn test_precedence() {
        let path = Some(PathBuf::from("hosts.txt"));
        assert_eq!(
            TargetSource::select(Some("a".into()), Some("10.0.0.0/24".into()), None, path.clone()),
            TargetSource::Single("a".into())
        );
        assert_eq!(
            TargetSource::select(None, Some("10.0.0.0/24".into()), Some(None), path.clone()),
            TargetSource::Cidr("10.0.0.0/24".into())
        );
        assert_eq!(
            TargetSource::select(None, None, Some(None), path.clone()),
            TargetSource::CidrList(None)
        );
        assert_eq!(
            TargetSource::select(None, None, None, path.clone()),
            TargetSource::HostList(PathBuf::from("hosts.txt"))
        );
        assert_eq!(TargetSource::select(None, None, None, None), TargetSource::Stdin);
    }

    #[test]
    fn test_read_lines_trims_and_skips_blanks() {
        let lines = read_lines(Cursor::new("  a.test \n\n\t\nb.test\r\n")).unwrap();
        assert_eq!(lines, vec!["a.test", "b.test"]);
    }

    #[test]
    fn test_single_target() {
        let specs = TargetSource::Single("example.com".into())
            .load(empty_stdin())
            .unwrap();
        assert_eq!(specs, vec![TargetSpec::Hostname("example.com".into())]);
    }

    #[test]
    fn test_malformed_cidr_lines_are_skipped() {
        let stdin = Cursor::new("10.0.0.0/30\nnonsense\n10.0.1.0/33\n192.168.0.0/24\n");
        let specs = TargetSource::CidrList(None).load(stdin).unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn test_cidr_list_falls_back_to_stdin() {
        let stdin = Cursor::new("10.0.0.0/30\n");
        let specs = TargetSource::CidrList(Some(PathBuf::from("/nonexistent/cidrs.txt")))
            .load(stdin)
            .unwrap();
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_host_list_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "example.com\n10.0.0.1\n\nnot a host\n").unwrap();

        let specs = TargetSource::HostList(file.path().to_path_buf())
            .load(empty_stdin())
            .unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn test_missing_host_list_yields_nothing() {
        let stdin = Cursor::new("should-not-be-read.test\n");
        let specs = TargetSource::HostList(PathBuf::from("/nonexistent/hosts.txt"))
            .load(stdin)
            .unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn test_stdin_hosts() {
        let stdin = Cursor::new("a.test\n10.0.0.0/31\n");
        let specs = TargetSource::Stdin.load(stdin).unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let stdin = Cursor::new(&b"good.test\n\xff\xfebad\n10.0.0.1\n"[..]);
        let specs = TargetSource::Stdin.load(stdin).unwrap();
        assert_eq!(specs.len(), 2);

        let lines = read_lines(Cursor::new(&b"a\r\n\xc3\n  b  "[..])).unwrap();
        assert_eq!(lines, vec!["a", "b"]);
    }
}
