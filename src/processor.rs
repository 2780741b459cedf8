use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, warn};

use crate::database::AppendSession;
use crate::error::IngestError;
use crate::parser;

/// Hard per-line sanity cap. A line longer than this means the input is
/// not an strace log.
pub const MAX_LINE_LEN: usize = 10 * 1024 * 1024;

/// Floor for the pass-2 line buffer.
const MIN_LINE_BUF: usize = 4096;

/// Scratch buffer for the pass-1 scan.
const SCAN_BUF_LEN: usize = 8 * 1024;

/// Per-file ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub total_lines: u64,
    pub parsed_lines: u64,
    pub failed_lines: u64,
}

/// Extract the PID from a trace filename like `trace.12345`.
pub fn extract_pid(filename: &str) -> Option<i32> {
    let (_, suffix) = filename.rsplit_once('.')?;
    suffix.parse::<i32>().ok()
}

/// Pass 1: count lines and find the longest delimiter-inclusive span, so
/// pass 2 can size its buffer to this file instead of the worst case. A
/// line whose content exceeds `cap` aborts the scan.
pub fn scan_lines(path: &Path, cap: usize) -> Result<(u64, usize), IngestError> {
    let mut file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let mut scratch = [0u8; SCAN_BUF_LEN];
    let mut lines = 0u64;
    let mut max_span = 0usize;
    let mut current = 0usize;

    loop {
        let n = file
            .read(&mut scratch)
            .map_err(|e| IngestError::io(path, e))?;
        if n == 0 {
            break;
        }
        let mut chunk = &scratch[..n];
        while let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            current += pos + 1;
            // The cap applies to line content, not the delimiter.
            if current - 1 > cap {
                return Err(IngestError::LineTooLong {
                    path: path.to_path_buf(),
                    line: lines + 1,
                    size: current - 1,
                    limit: cap,
                });
            }
            lines += 1;
            max_span = max_span.max(current);
            current = 0;
            chunk = &chunk[pos + 1..];
        }
        current += chunk.len();
        if current > cap {
            return Err(IngestError::LineTooLong {
                path: path.to_path_buf(),
                line: lines + 1,
                size: current,
                limit: cap,
            });
        }
    }

    // A final line without a trailing newline still counts.
    if current > 0 {
        lines += 1;
        max_span = max_span.max(current);
    }

    Ok((lines, max_span))
}

/// Ingest one trace file into the caller's append session.
///
/// Two passes: the first sizes the line buffer to the longest line in the
/// file, the second parses each line and appends the record before the
/// buffer is reused. Unrecognised lines are skipped, per-record append
/// failures are counted; only I/O errors and oversized lines fail the
/// file as a whole.
pub fn process_file(
    session: &mut AppendSession<'_>,
    path: &Path,
) -> Result<FileStats, IngestError> {
    let (line_count, max_span) = scan_lines(path, MAX_LINE_LEN)?;
    debug!(
        "{}: {} lines, longest {} bytes",
        path.display(),
        line_count,
        max_span
    );

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    let pid = extract_pid(filename).unwrap_or(0);

    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let mut reader = BufReader::with_capacity(SCAN_BUF_LEN, file);
    let mut line_buf: Vec<u8> = Vec::with_capacity(max_span.max(MIN_LINE_BUF));

    let mut stats = FileStats::default();
    loop {
        line_buf.clear();
        let n = reader
            .read_until(b'\n', &mut line_buf)
            .map_err(|e| IngestError::io(path, e))?;
        if n == 0 {
            break;
        }
        stats.total_lines += 1;

        let mut bytes = line_buf.as_slice();
        if bytes.last() == Some(&b'\n') {
            bytes = &bytes[..bytes.len() - 1];
        }
        // strace escapes non-printable bytes, so real syscall lines are
        // ASCII; anything else is treated like an unrecognised line.
        let Ok(text) = std::str::from_utf8(bytes) else {
            continue;
        };
        let Some(record) = parser::parse_line(text) else {
            continue;
        };
        match session.append(filename, pid, &record) {
            Ok(()) => stats.parsed_lines += 1,
            Err(e) => {
                stats.failed_lines += 1;
                warn!("{}:{}: append failed: {}", filename, stats.total_lines, e);
            }
        }
    }

    Ok(stats)
}
