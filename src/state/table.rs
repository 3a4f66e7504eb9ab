use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::config::ProbePolicy;
use super::record::Record;
use crate::annotation::Manifest;
use crate::error::{PipelineError, Result};
use crate::probe::{self, ShapeDecoder};

/// Outcome counts of one `add_dimensions` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Records handed to the decoder
    pub probed: usize,
    /// Records left alone because they already had a shape
    pub skipped: usize,
    /// Probed records the decoder could not read
    pub failed: usize,
}

/// The DatasetTable holds one Record per manifest row.
///
/// Rows stay in manifest order until a sorted copy is requested. Filtering
/// and sorting never touch `self`; they return new, independent tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetTable {
    records: Vec<Record>,
}

impl DatasetTable {
    /// Build a table from records, rejecting duplicate absolute paths
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if !seen.insert(record.absolute_path.as_str()) {
                return Err(PipelineError::DuplicateRecord {
                    path: record.absolute_path.clone(),
                    index: i,
                });
            }
        }
        Ok(Self { records })
    }

    /// One record per manifest entry, metadata still empty
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        Self::from_records(
            manifest
                .entries
                .iter()
                .map(|e| Record::new(e.absolute_path.clone(), e.relative_path.clone()))
                .collect(),
        )
    }

    #[cfg(test)]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indices of the records the probe should visit under `policy`
    fn pending(&self, policy: ProbePolicy) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| policy == ProbePolicy::Reprobe || r.shape.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Probe every record (or only the ones missing a shape) in manifest order.
    ///
    /// Unreadable images leave the record's shape empty; the pass never
    /// aborts on a bad file. Areas of re-probed records are cleared so a
    /// stale area can never outlive its shape.
    pub fn add_dimensions(
        &mut self,
        decoder: &dyn ShapeDecoder,
        policy: ProbePolicy,
    ) -> ExtractionReport {
        let pending = self.pending(policy);
        let mut report = ExtractionReport {
            skipped: self.records.len() - pending.len(),
            ..Default::default()
        };

        for i in pending {
            let record = &mut self.records[i];
            record.shape = probe::extract(decoder, &record.absolute_path);
            record.area = None;
            report.probed += 1;
            if record.shape.is_none() {
                report.failed += 1;
            }
        }

        info!(
            "Probed {} images ({} unreadable, {} skipped)",
            report.probed, report.failed, report.skipped
        );
        report
    }

    /// Same contract as `add_dimensions`, with up to `workers` decodes in
    /// flight and an optional per-image time budget.
    pub async fn add_dimensions_concurrent(
        &mut self,
        decoder: Arc<dyn ShapeDecoder>,
        policy: ProbePolicy,
        workers: usize,
        timeout: Option<Duration>,
    ) -> ExtractionReport {
        let pending = self.pending(policy);
        let paths = pending
            .iter()
            .map(|&i| self.records[i].absolute_path.clone())
            .collect();

        let shapes = probe::probe_all(paths, decoder, workers, timeout).await;

        let mut report = ExtractionReport {
            skipped: self.records.len() - pending.len(),
            ..Default::default()
        };
        for (i, shape) in pending.into_iter().zip(shapes) {
            let record = &mut self.records[i];
            record.shape = shape;
            record.area = None;
            report.probed += 1;
            if shape.is_none() {
                report.failed += 1;
            }
        }

        info!(
            "Probed {} images with {} workers ({} unreadable, {} skipped)",
            report.probed, workers, report.failed, report.skipped
        );
        report
    }

    /// Set `area = height * width` wherever a shape is known
    pub fn add_area(&mut self) {
        for record in &mut self.records {
            record.area = record.shape.map(|s| s.area());
        }
    }

    /// Records no taller than `max_height` and no wider than `max_width`.
    /// Records without a shape cannot satisfy the bound and are dropped.
    pub fn filter(&self, max_height: u64, max_width: u64) -> DatasetTable {
        let records = self
            .records
            .iter()
            .filter(|r| match r.shape {
                Some(s) => u64::from(s.height) <= max_height && u64::from(s.width) <= max_width,
                None => false,
            })
            .cloned()
            .collect();
        DatasetTable { records }
    }

    /// Stable ascending sort by area; records without an area go last,
    /// keeping their relative order.
    pub fn sort_by_area(&self) -> DatasetTable {
        let mut records = self.records.clone();
        // sort_by_key is stable; (is_none, area) puts None after every Some
        records.sort_by_key(|r| (r.area.is_none(), r.area));
        DatasetTable { records }
    }

    /// Non-null areas in table order
    pub fn areas(&self) -> Vec<u64> {
        self.records.iter().filter_map(|r| r.area).collect()
    }
}

impl<'a> IntoIterator for &'a DatasetTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Paths left-aligned, numbers right-aligned
fn write_row(f: &mut fmt::Formatter<'_>, row: &[&str], widths: &[usize]) -> fmt::Result {
    for (col, value) in row.iter().enumerate() {
        if col > 0 {
            write!(f, "  ")?;
        }
        if col == 1 || col == 2 {
            write!(f, "{:<width$}", value, width = widths[col])?;
        } else {
            write!(f, "{:>width$}", value, width = widths[col])?;
        }
    }
    writeln!(f)
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NaN".to_string())
}

/// Plain-text table, one row per record, missing values shown as NaN
impl fmt::Display for DatasetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = ["", "absolute_path", "relative_path", "height", "width", "depth", "area"];

        let rows: Vec<[String; 7]> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                [
                    i.to_string(),
                    r.absolute_path.clone(),
                    r.relative_path.clone(),
                    cell(r.height()),
                    cell(r.width()),
                    cell(r.depth()),
                    cell(r.area),
                ]
            })
            .collect();

        let mut widths = header.map(|h| h.chars().count());
        for row in &rows {
            for (w, value) in widths.iter_mut().zip(row.iter()) {
                *w = (*w).max(value.chars().count());
            }
        }

        write_row(f, &header[..], &widths)?;
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            write_row(f, &cells[..], &widths)?;
        }
        write!(f, "[{} rows x 6 columns]", self.records.len())
    }
}
