use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::PlotSink;
use crate::error::{PipelineError, Result};
use crate::stats::{AreaHistogram, StatisticsSummary};

/// JSON document written by `JsonReport`
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    /// RFC 3339 timestamp of the run
    pub generated_at: DateTime<Utc>,
    /// Manifest the numbers were computed from
    pub annotation: Option<String>,
    pub summary: Option<StatisticsSummary>,
    pub area_histogram: Option<AreaHistogram>,
}

/// Collects results and writes them as one pretty-printed JSON file on `finish`
#[derive(Debug)]
pub struct JsonReport {
    output: PathBuf,
    document: ReportDocument,
}

impl JsonReport {
    pub fn new(output: impl Into<PathBuf>, annotation: Option<&Path>) -> Self {
        Self {
            output: output.into(),
            document: ReportDocument {
                generated_at: Utc::now(),
                annotation: annotation.map(|p| p.to_string_lossy().to_string()),
                summary: None,
                area_histogram: None,
            },
        }
    }
}

impl PlotSink for JsonReport {
    fn area_histogram(&mut self, hist: &AreaHistogram) -> Result<()> {
        self.document.area_histogram = Some(hist.clone());
        Ok(())
    }

    fn summary(&mut self, summary: &StatisticsSummary) -> Result<()> {
        self.document.summary = Some(*summary);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.document)?;
        std::fs::write(&self.output, json).map_err(|e| PipelineError::io(&self.output, e))
    }
}
