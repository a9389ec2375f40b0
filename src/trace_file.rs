use crate::command::TraceEntry;
use crate::parse::{parse_line, ParseError};
use crate::tracker::StreamTracker;
use std::fs::File;
use std::io::{self, prelude::*, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("trace file I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("line {line_number}: {source}")]
    ParseError {
        line_number: usize,
        source: ParseError,
    },
}

/// Read every PGRAPH method in a trace log, in order
///
/// Lines that are not methods are skipped. A method line whose
/// argument cannot be decoded stops the whole read, because the draw
/// numbering of everything after it would be unreliable.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEntry>, TraceFileError> {
    let mut tracker = StreamTracker::new();
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let parsed = parse_line(line.trim_end())
            .map_err(|source| TraceFileError::ParseError { line_number, source })?;

        match parsed {
            Some((dialect, call)) => {
                tracing::trace!(line_number, ?dialect, %call, "method");
                entries.push(TraceEntry::Method(tracker.place(line_number, call)));
            }
            None => skipped += 1,
        }
    }

    tracing::debug!(skipped, "ignored lines that are not PGRAPH methods");
    tracing::info!(
        methods = entries.len(),
        draws_completed = tracker.draw_number() - 1,
        "read trace log"
    );
    Ok(entries)
}

/// Load a trace log from file
#[tracing::instrument]
pub fn load_trace(trace_file_path: &Path) -> Result<Vec<TraceEntry>, TraceFileError> {
    let file = File::open(trace_file_path)?;
    read_trace(BufReader::new(file))
}
