/// Lazy manifest reader
///
/// `ManifestRows` owns the manifest file handle for exactly as long as rows
/// are being pulled: the file is opened on the first `next()`, and closed on
/// exhaustion, on the first error, on `close()`, or when the iterator is
/// dropped half way through.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use super::csv::split_row;
use super::ManifestEntry;
use crate::error::{PipelineError, Result};

enum RowsState {
    /// Not opened yet
    Pending,
    /// Header consumed, yielding data rows
    Open {
        lines: Lines<BufReader<File>>,
        line_no: usize,
    },
    /// Exhausted, failed or closed; the handle is gone
    Closed,
}

pub struct ManifestRows {
    path: PathBuf,
    state: RowsState,
}

impl ManifestRows {
    /// Prepare to iterate `path`. Only existence is checked here.
    pub fn new(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::NotFound(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            state: RowsState::Pending,
        })
    }

    /// File line of the row most recently returned, blank lines included.
    /// Zero before the first row and after the handle is released.
    pub fn line_no(&self) -> usize {
        match &self.state {
            RowsState::Open { line_no, .. } => *line_no,
            _ => 0,
        }
    }

    /// Whether the file handle is currently held
    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        matches!(self.state, RowsState::Open { .. })
    }

    /// Release the file handle early; later calls to `next` return None
    pub fn close(&mut self) {
        self.state = RowsState::Closed;
    }

    /// Open the file and validate the header row
    fn open(&self) -> Result<RowsState> {
        let file = File::open(&self.path).map_err(|e| PipelineError::io(&self.path, e))?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;

        // First non-blank line is the header
        loop {
            line_no += 1;
            match lines.next() {
                None => {
                    return Err(PipelineError::format(&self.path, line_no, "file is empty"));
                }
                Some(Err(e)) => return Err(PipelineError::io(&self.path, e)),
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => {
                    let header = split_row(strip_bom(&line))
                        .map_err(|reason| PipelineError::format(&self.path, line_no, reason))?;
                    if header.len() != 2 {
                        return Err(PipelineError::format(
                            &self.path,
                            line_no,
                            format!("header must have exactly 2 columns, found {}", header.len()),
                        ));
                    }
                    return Ok(RowsState::Open { lines, line_no });
                }
            }
        }
    }
}

impl Iterator for ManifestRows {
    type Item = Result<ManifestEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let RowsState::Pending = self.state {
            match self.open() {
                Ok(state) => self.state = state,
                Err(e) => {
                    self.state = RowsState::Closed;
                    return Some(Err(e));
                }
            }
        }

        let (lines, line_no) = match &mut self.state {
            RowsState::Open { lines, line_no } => (lines, line_no),
            _ => return None,
        };

        loop {
            *line_no += 1;
            let current = *line_no;
            let result = match lines.next() {
                None => {
                    self.state = RowsState::Closed;
                    return None;
                }
                Some(Err(e)) => Err(PipelineError::io(&self.path, e)),
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => parse_entry(&line)
                    .map_err(|reason| PipelineError::format(&self.path, current, reason)),
            };

            if result.is_err() {
                self.state = RowsState::Closed;
            }
            return Some(result);
        }
    }
}

fn parse_entry(line: &str) -> std::result::Result<ManifestEntry, String> {
    let mut fields = split_row(line)?;
    if fields.len() != 2 {
        return Err(format!("expected 2 fields, found {}", fields.len()));
    }
    let relative_path = fields.pop().unwrap_or_default();
    let absolute_path = fields.pop().unwrap_or_default();
    if absolute_path.is_empty() {
        return Err("absolute path is empty".to_string());
    }
    Ok(ManifestEntry {
        absolute_path,
        relative_path,
    })
}

/// Files saved by some spreadsheet tools start with a UTF-8 BOM
fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}
