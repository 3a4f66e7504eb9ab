/// Analysis parameters for a batch run
///
/// This struct collects every knob of the pipeline: filter bounds,
/// histogram resolution and probe behavior. It can be stored as JSON
/// and loaded with `--config`, with command-line flags applied on top.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Number of area histogram bins when nothing else is requested
pub const DEFAULT_BIN_COUNT: usize = 20;

/// What `add_dimensions` does with records that already carry a shape
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbePolicy {
    /// Only probe records whose shape is still missing
    #[default]
    SkipPopulated,
    /// Probe every record again, overwriting earlier results
    Reprobe,
}

/// All parameters for one analysis run
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Filter bound on image height (inclusive)
    pub max_height: i64,

    /// Filter bound on image width (inclusive)
    pub max_width: i64,

    /// Equal-width bins for the area histogram
    /// - Must be at least 1
    pub bin_count: i64,

    /// Re-probe or skip records with known shapes
    pub probe_policy: ProbePolicy,

    /// Parallel decoders for the metadata probe
    /// - 1 = sequential, in manifest order
    pub workers: i64,

    /// Per-image decode budget in milliseconds
    /// - None = no limit
    /// - An expired decode counts as an unreadable image
    pub decode_timeout_ms: Option<i64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_height: 0,
            max_width: 0,
            bin_count: DEFAULT_BIN_COUNT as i64,
            probe_policy: ProbePolicy::default(),
            workers: 1,
            decode_timeout_ms: None,
        }
    }
}

impl AnalysisConfig {
    #[cfg(test)]
    pub fn new(max_height: i64, max_width: i64) -> Self {
        Self {
            max_height,
            max_width,
            ..Self::default()
        }
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config file written by `to_json` (or by hand)
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::NotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Ok(Self::from_json(&json)?)
    }

    /// Reject parameters the pipeline cannot honor.
    /// Runs before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.max_height < 0 {
            return Err(PipelineError::Config(format!(
                "max height must be non-negative, got {}",
                self.max_height
            )));
        }
        if self.max_width < 0 {
            return Err(PipelineError::Config(format!(
                "max width must be non-negative, got {}",
                self.max_width
            )));
        }
        if self.bin_count < 1 {
            return Err(PipelineError::Config(format!(
                "bin count must be at least 1, got {}",
                self.bin_count
            )));
        }
        if self.workers < 1 {
            return Err(PipelineError::Config(format!(
                "worker count must be at least 1, got {}",
                self.workers
            )));
        }
        if let Some(ms) = self.decode_timeout_ms {
            if ms < 1 {
                return Err(PipelineError::Config(format!(
                    "decode timeout must be positive, got {}ms",
                    ms
                )));
            }
        }
        Ok(())
    }

    // The accessors below assume `validate` has passed.

    pub fn height_bound(&self) -> u64 {
        self.max_height.max(0) as u64
    }

    pub fn width_bound(&self) -> u64 {
        self.max_width.max(0) as u64
    }

    pub fn bins(&self) -> usize {
        self.bin_count.max(1) as usize
    }

    pub fn worker_count(&self) -> usize {
        self.workers.max(1) as usize
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1) as u64))
    }
}
